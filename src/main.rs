use clap::{Parser, Subcommand};
use eyre::{bail, Context, Result};
use rlink_archive::{ArchiveBuilder, ArchiveStore};
use rlink_core::{ObjectType, RuntimeConfig};
use rlink_loader::{ClassSource, DirectoryClassSource, JarClassSource, Loader};
use rlink_runtime::{loader_name, ContextOptions, RuntimeLoadingContext};
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "rlink", version, about = "Loads and links classes like a JVM would")]
struct Cli {
	/// Log what the resolver does.
	#[arg(short, long, global = true)]
	verbose: bool,
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Resolve and link classes through the app loader.
	Resolve {
		/// Directories or jars served by the bootstrap loader.
		#[arg(short, long = "bootclasspath")]
		bootstrap: Vec<PathBuf>,
		/// Directories or jars served by the app loader.
		#[arg(short = 'c', long = "classpath")]
		classpath: Vec<PathBuf>,
		/// Archive consulted before any class path.
		#[arg(short, long)]
		archive: Option<PathBuf>,
		#[arg(required = true)]
		names: Vec<String>,
	},
	/// Archive classes from a class path.
	Dump {
		#[arg(short = 'c', long = "classpath", required = true)]
		classpath: Vec<PathBuf>,
		/// Loader shape the classes are archived for, `bootstrap`, `app` or a loader class.
		#[arg(short, long, default_value = "app")]
		shape: String,
		#[arg(short, long)]
		output: PathBuf,
		#[arg(required = true)]
		names: Vec<String>,
	},
	/// Print the classes in an archive.
	ArchiveInfo { path: PathBuf },
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	rlink_core::init_with(if cli.verbose {
		Level::DEBUG
	} else {
		Level::WARN
	});

	match cli.command {
		Command::Resolve {
			bootstrap,
			classpath,
			archive,
			names,
		} => resolve(&bootstrap, &classpath, archive, &names),
		Command::Dump {
			classpath,
			shape,
			output,
			names,
		} => dump(&classpath, &shape, &output, &names),
		Command::ArchiveInfo { path } => archive_info(&path),
	}
}

fn resolve(
	bootstrap: &[PathBuf],
	classpath: &[PathBuf],
	archive: Option<PathBuf>,
	names: &[String],
) -> Result<()> {
	let mut options = ContextOptions::default();
	if let Some(archive) = archive {
		options = options.with_archive(archive);
	}
	let context = RuntimeLoadingContext::new(options);

	let mut boot = Loader::bootstrap();
	for path in bootstrap {
		boot = boot.with_source(open_source(path)?);
	}
	let boot = context.register(boot)?;
	let mut app = Loader::app(boot.id());
	for path in classpath {
		app = app.with_source(open_source(path)?);
	}
	let app = context.register(app)?;

	let mut failed = 0;
	for name in names {
		match context.resolve(name, app.id()) {
			Ok(class) => println!(
				"{} {} {:?} {:08x} ({} methods, {} fields)",
				class.name.external_name(),
				loader_name(context.registry(), class.loader),
				class.origin,
				class.checksum,
				class.methods.len(),
				class.fields.len()
			),
			Err(error) => {
				failed += 1;
				eprintln!("{name}: {error}");
			}
		}
	}

	if failed > 0 {
		bail!("{failed} of {} classes could not be resolved", names.len());
	}
	Ok(())
}

fn dump(classpath: &[PathBuf], shape: &str, output: &Path, names: &[String]) -> Result<()> {
	let sources = classpath
		.iter()
		.map(|path| open_source(path))
		.collect::<Result<Vec<_>>>()?;

	let mut builder = ArchiveBuilder::new(RuntimeConfig::host());
	for name in names {
		let ty = ObjectType::from_external(name);
		let mut bytes = None;
		for source in &sources {
			bytes = source.try_load(&ty)?;
			if bytes.is_some() {
				break;
			}
		}
		let Some(bytes) = bytes else {
			bail!("{name} is not on the class path");
		};
		builder
			.add_class(shape, &bytes)
			.wrap_err_with(|| format!("Archiving {name}"))?;
	}

	builder.write(output)?;
	println!("Wrote {} classes to {}", builder.len(), output.display());
	Ok(())
}

fn archive_info(path: &Path) -> Result<()> {
	let store = ArchiveStore::open(path, RuntimeConfig::host())
		.wrap_err_with(|| format!("Opening {}", path.display()))?;

	println!("{} ({}, {} classes)", path.display(), store.config(), store.len());
	for entry in store.entries() {
		println!(
			"  {:<24} {} ({} bytes, checksum {:08x})",
			entry.loader_shape,
			entry.name.replace('/', "."),
			entry.length,
			entry.source_checksum
		);
	}
	Ok(())
}

fn open_source(path: &Path) -> Result<Box<dyn ClassSource>> {
	if path.is_dir() {
		return Ok(Box::new(DirectoryClassSource::new(path)));
	}
	match path.extension().and_then(|v| v.to_str()) {
		Some("jar" | "zip") => Ok(Box::new(JarClassSource::open(path)?)),
		_ => bail!("{} is neither a directory nor a jar", path.display()),
	}
}
