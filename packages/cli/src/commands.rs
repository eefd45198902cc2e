//! Subcommands and their execution against a mount session.
//!
//! Paths may be absolute local paths or relative to the mount root.
//! Every mutating command commits before returning.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Subcommand;
use remount::node::{JCR_DATA, PRIMARY_TYPE};
use remount::{CommitReport, Error, Outcome, OrderHint, PropertyMap, Resolver, UploadOptions};
use remount_core::{codec, Binary, CodecError, PathError, PropertyType, ResourcePath, Value};

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Mount(#[from] Error),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("no resource at '{0}'")]
    NotFound(ResourcePath),

    #[error("unknown property type '{0}'")]
    UnknownType(String),

    #[error("{0}")]
    Usage(String),
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the children of a resource
    Ls { path: Option<String> },

    /// Show the properties of a resource
    Stat {
        path: String,
        /// Also check existence with a HEAD request
        #[arg(long)]
        probe: bool,
    },

    /// Write binary content to stdout
    Cat {
        path: String,
        #[arg(long, default_value = JCR_DATA)]
        property: String,
    },

    /// Set a property. Untyped values are inferred (dates, booleans)
    Set {
        path: String,
        name: String,
        value: String,
        /// Property type, e.g. Long, Date, Boolean
        #[arg(long = "type")]
        type_name: Option<String>,
    },

    /// Delete a resource, or one of its properties with --property
    Rm {
        path: String,
        #[arg(long)]
        property: Option<String>,
    },

    /// Create a resource
    Mkdir {
        path: String,
        #[arg(long = "type", default_value = "nt:unstructured")]
        primary_type: String,
    },

    /// Copy a resource into another one
    Cp { source: String, destination: String },

    /// Move a resource into another one, or reorder it with --order
    Mv {
        source: String,
        destination: String,
        /// first, last, "before NAME", "after NAME" or an index
        #[arg(long)]
        order: Option<OrderHint>,
    },

    /// Upload a local file
    Put {
        file: PathBuf,
        destination: String,
        #[arg(long)]
        mime_type: Option<String>,
    },
}

/// Run one command, writing its output to `out`.
pub fn run(command: Command, resolver: &mut Resolver, out: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Ls { path } => {
            let path = match path {
                Some(path) => local_path(resolver, &path)?,
                None => resolver.mount_root().clone(),
            };
            require(resolver, &path)?;
            for child in resolver.children(&path) {
                writeln!(out, "{}\t{}", child.name(), child.resource_type().unwrap_or("-"))?;
            }
        }
        Command::Stat { path, probe } => {
            let path = local_path(resolver, &path)?;
            let node = require(resolver, &path)?;
            writeln!(out, "path: {}", node.path())?;
            writeln!(out, "kind: {:?}", node.kind())?;
            if !node.is_accessible() {
                writeln!(out, "not accessible")?;
            }
            if probe {
                let remote = resolver.context().translator().to_remote(&path);
                let exists = resolver
                    .context()
                    .transport()
                    .exists(remote.as_str())
                    .map_err(Error::from)?;
                writeln!(out, "exists: {}", exists)?;
            }
            for (name, value) in node.properties() {
                writeln!(out, "  {} = {}", name, format_value(value))?;
            }
        }
        Command::Cat { path, property } => {
            let path = local_path(resolver, &path)?;
            let mut stream = match resolver.open_binary(&path, &property) {
                Err(Error::NotBinary { .. }) if property == JCR_DATA => {
                    resolver.open_binary(&path.child("jcr:content")?, &property)?
                }
                other => other?,
            };
            io::copy(&mut stream, out)?;
            stream.close();
        }
        Command::Set {
            path,
            name,
            value,
            type_name,
        } => {
            let path = local_path(resolver, &path)?;
            let value = parse_value(&value, type_name.as_deref())?;
            resolver.set_property(&path, &name, value)?;
            commit(resolver, out)?;
        }
        Command::Rm { path, property } => {
            let path = local_path(resolver, &path)?;
            match property {
                Some(name) => {
                    if resolver.remove_property(&path, &name)?.is_none() {
                        return Err(CliError::Usage(format!(
                            "'{}' has no property '{}'",
                            path, name
                        )));
                    }
                }
                None => resolver.delete(&path)?,
            }
            commit(resolver, out)?;
        }
        Command::Mkdir { path, primary_type } => {
            let path = local_path(resolver, &path)?;
            let parent = path
                .parent()
                .ok_or_else(|| CliError::Usage("cannot create the root".to_string()))?;
            let mut properties = PropertyMap::new();
            properties.insert(PRIMARY_TYPE.to_string(), Value::from(primary_type));
            resolver.create(&parent, path.name(), properties)?;
            commit(resolver, out)?;
        }
        Command::Cp {
            source,
            destination,
        } => {
            let source = local_path(resolver, &source)?;
            let destination = local_path(resolver, &destination)?;
            resolver.copy(&source, &destination)?;
            commit(resolver, out)?;
        }
        Command::Mv {
            source,
            destination,
            order,
        } => {
            let source = local_path(resolver, &source)?;
            let destination = local_path(resolver, &destination)?;
            resolver.move_to(&source, &destination, order)?;
            commit(resolver, out)?;
        }
        Command::Put {
            file,
            destination,
            mime_type,
        } => {
            let destination = local_path(resolver, &destination)?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| CliError::Usage(format!("'{}' has no file name", file.display())))?
                .to_string();
            let content = std::fs::read(&file)?;
            let mut options = UploadOptions::default().with_filename(name.clone());
            options.mime_type = mime_type;
            resolver.upload(&destination, &name, content, options)?;
            commit(resolver, out)?;
        }
    }
    Ok(())
}

fn local_path(resolver: &Resolver, path: &str) -> Result<ResourcePath, CliError> {
    if path.starts_with('/') {
        Ok(ResourcePath::parse(path)?)
    } else {
        Ok(resolver.mount_root().join(path)?)
    }
}

fn require(resolver: &mut Resolver, path: &ResourcePath) -> Result<remount::RemoteNode, CliError> {
    resolver
        .resolve(path)
        .ok_or_else(|| CliError::NotFound(path.clone()))
}

fn commit(resolver: &mut Resolver, out: &mut dyn Write) -> Result<(), CliError> {
    let report = resolver.commit()?;
    print_report(&report, out)
}

fn print_report(report: &CommitReport, out: &mut dyn Write) -> Result<(), CliError> {
    for entry in &report.entries {
        let outcome = match &entry.outcome {
            Outcome::Applied => "ok".to_string(),
            Outcome::NoChanges => "no changes".to_string(),
            Outcome::Failed(reason) => format!("failed: {}", reason),
        };
        writeln!(out, "{} {}: {}", entry.operation, entry.path, outcome)?;
    }
    Ok(())
}

fn parse_value(literal: &str, type_name: Option<&str>) -> Result<Value, CliError> {
    match type_name {
        None => Ok(codec::decode_string(literal)),
        Some(name) => {
            let property_type = PropertyType::from_name(name)
                .ok_or_else(|| CliError::UnknownType(name.to_string()))?;
            Ok(codec::decode_as(property_type, literal)?)
        }
    }
}

/// Human-readable rendering of a property value.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Binary(Binary::Remote(remote)) => match remote.length {
            Some(length) => format!("<binary, {} bytes>", length),
            None => "<binary>".to_string(),
        },
        Value::Binary(Binary::Inline(inline)) => format!("<binary, {} bytes>", inline.data.len()),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        scalar => codec::encode_typed(scalar).unwrap_or_else(|_| format!("{:?}", scalar)),
    }
}
