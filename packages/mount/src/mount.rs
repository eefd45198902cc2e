//! A configured remote mount and the state its sessions share.

use std::sync::Arc;

use remount_core::PathTranslator;
use remount_http::{Credentials, HttpExecutor, ReqwestExecutor, Transport};
use tracing::info;

use crate::config::MountConfig;
use crate::resolver::Resolver;
use crate::Error;

/// Immutable per-mount state: configuration, translator and transport.
#[derive(Debug)]
pub struct MountContext {
    config: MountConfig,
    translator: PathTranslator,
    transport: Transport,
    origin: String,
}

impl MountContext {
    pub fn new(config: MountConfig, executor: Arc<dyn HttpExecutor>) -> Result<Self, Error> {
        config.validate()?;
        let translator = config.translator()?;

        let mut transport =
            Transport::new(executor, &config.remote_url)?.with_extra_headers(&config.extra_headers);
        if let Some(username) = &config.username {
            let password = config.password.clone().unwrap_or_default();
            transport = transport.with_credentials(
                Credentials::new(username.clone(), password),
                config.preemptive_auth,
            );
        }

        let origin = format!("{}#{}", transport.base_url(), translator.mount_root());
        Ok(Self {
            config,
            translator,
            transport,
            origin,
        })
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    pub fn translator(&self) -> &PathTranslator {
        &self.translator
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Identifies binaries read through this mount.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// A remote repository mounted under a local path.
///
/// Each [`Resolver`] handed out is an independent session with its own
/// cache and pending changes.
#[derive(Debug, Clone)]
pub struct RemoteMount {
    context: Arc<MountContext>,
}

impl RemoteMount {
    pub fn new(config: MountConfig, executor: Arc<dyn HttpExecutor>) -> Result<Self, Error> {
        let context = MountContext::new(config, executor)?;
        info!(
            remote = %context.transport().base_url(),
            mount_root = %context.translator().mount_root(),
            "Mounted remote repository"
        );
        Ok(Self {
            context: Arc::new(context),
        })
    }

    /// Mount over HTTP using the configured timeout.
    pub fn connect(config: MountConfig) -> Result<Self, Error> {
        let executor = ReqwestExecutor::new(config.timeout())?;
        Self::new(config, Arc::new(executor))
    }

    /// Open a new session.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.context.clone())
    }

    pub fn config(&self) -> &MountConfig {
        self.context.config()
    }

    pub fn context(&self) -> &Arc<MountContext> {
        &self.context
    }
}
