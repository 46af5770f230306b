use anyhow::{bail, Context as _, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use eventlens::db::{EventUpdate, NewEvent};
use eventlens::export::{self, ExportFormat};
use eventlens::pipeline::{self, library, sharing, UploadFile};
use eventlens::{logging, Config, Context};

struct Cli {
    config_path: Option<PathBuf>,
    owner: Option<String>,
    command: String,
    args: Vec<String>,
}

fn parse_args() -> Cli {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut owner = std::env::var("EVENTLENS_OWNER").ok().filter(|o| !o.is_empty());

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("eventlens {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--owner" | "-o" => {
                if i + 1 < args.len() {
                    owner = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: --owner requires an id argument");
                    std::process::exit(1);
                }
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
            _ => {
                return Cli {
                    config_path,
                    owner,
                    command: args[i].clone(),
                    args: args[i + 1..].to_vec(),
                };
            }
        }
        i += 1;
    }

    print_help();
    std::process::exit(1);
}

fn print_help() {
    println!(
        r#"eventlens - photo library for event photographers

USAGE:
    eventlens [OPTIONS] <COMMAND> [ARGS]

OPTIONS:
    --config, -c PATH   Path to config file
    --owner, -o ID      Owner the command acts for
    --version, -V       Show version
    --help, -h          Show this help message

PHOTOS:
    upload FILE... [--event ID] [--album ID]
    photos [--event ID | --album ID]
    delete PHOTO_ID
    search QUERY...
    export PATH [--event ID] [--format json|csv]
    reconcile [--repair]

FACES:
    face-add NAME IMAGE_URL
    face-list
    face-delete PROFILE_ID
    face-search FACE_ID

ALBUMS:
    album-create NAME [--description TEXT] [--public]
    album-list
    album-add ALBUM_ID PHOTO_ID...
    album-cover ALBUM_ID IMAGE_URL
    album-delete ALBUM_ID

EVENTS:
    event-create NAME YYYY-MM-DD [--description TEXT] [--location TEXT] [--public]
    event-list
    event-update EVENT_ID [--name TEXT] [--date YYYY-MM-DD] [--description TEXT]
                 [--location TEXT] [--cover URL] [--public | --private]
    event-delete EVENT_ID

SHARING:
    share EVENT_ID [--face-auth] [--expires-days N]
    access SHARE_CODE [--selfie PATH|URL]
    download EVENT_ID

ENVIRONMENT:
    EVENTLENS_CONFIG    Path to config file (overrides default location)
    EVENTLENS_OWNER     Default owner id
    EVENTLENS_LOG       Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/eventlens/config.toml"#
    );
}

/// Positional arguments plus `--name value` options and bare `--flag`s.
struct CommandArgs {
    positional: Vec<String>,
    options: HashMap<String, String>,
    flags: HashSet<String>,
}

impl CommandArgs {
    fn parse(args: &[String], value_options: &[&str], flag_options: &[&str]) -> Result<Self> {
        let mut parsed = CommandArgs {
            positional: Vec::new(),
            options: HashMap::new(),
            flags: HashSet::new(),
        };

        let mut i = 0;
        while i < args.len() {
            let arg = args[i].as_str();
            if value_options.contains(&arg) {
                let Some(value) = args.get(i + 1) else {
                    bail!("{} requires a value", arg);
                };
                parsed.options.insert(arg.to_string(), value.clone());
                i += 1;
            } else if flag_options.contains(&arg) {
                parsed.flags.insert(arg.to_string());
            } else if arg.starts_with("--") {
                bail!("Unknown option: {}", arg);
            } else {
                parsed.positional.push(arg.to_string());
            }
            i += 1;
        }

        Ok(parsed)
    }

    fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    fn flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    fn expect(&self, count: usize, usage: &str) -> Result<()> {
        if self.positional.len() != count {
            bail!("Usage: eventlens {}", usage);
        }
        Ok(())
    }

    fn expect_at_least(&self, count: usize, usage: &str) -> Result<()> {
        if self.positional.len() < count {
            bail!("Usage: eventlens {}", usage);
        }
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// An error and its causes on one line.
fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", value))
}

fn main() -> Result<()> {
    let cli = parse_args();

    let config = match cli.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Logging disabled: {:#}", e);
    }

    let ctx = Context::open(config)?;
    run(&ctx, &cli)
}

fn owner(cli: &Cli) -> Result<&str> {
    cli.owner
        .as_deref()
        .context("No owner given: pass --owner ID or set EVENTLENS_OWNER")
}

fn run(ctx: &Context, cli: &Cli) -> Result<()> {
    let args = &cli.args;

    match cli.command.as_str() {
        "upload" => {
            let a = CommandArgs::parse(args, &["--event", "--album"], &[])?;
            a.expect_at_least(1, "upload FILE... [--event ID] [--album ID]")?;
            let files = a
                .positional
                .iter()
                .map(|p| UploadFile::from_path(Path::new(p)))
                .collect::<Result<Vec<_>>>()?;

            let report = pipeline::ingest_batch(ctx, &files, owner(cli)?, a.option("--event"), a.option("--album"));
            for result in &report.results {
                match result {
                    Ok(outcome) => {
                        println!("{}\t{}\t{}", outcome.photo.id, outcome.photo.name, outcome.photo.url);
                        for warning in &outcome.warnings {
                            eprintln!("  warning: {}", warning);
                        }
                    }
                    Err(failure) => {
                        eprintln!("{}: {}", failure.name, describe(&failure.error));
                        if let Some(ref path) = failure.orphaned_path {
                            eprintln!("  orphaned object: {}", path);
                        }
                    }
                }
            }
            println!("{} uploaded, {} failed", report.succeeded(), report.failed());
            if report.failed() > 0 {
                std::process::exit(2);
            }
        }
        "photos" => {
            let a = CommandArgs::parse(args, &["--event", "--album"], &[])?;
            a.expect(0, "photos [--event ID | --album ID]")?;
            let owner = owner(cli)?;
            let photos = match (a.option("--event"), a.option("--album")) {
                (Some(event_id), None) => library::event_photos(ctx, owner, event_id)?,
                (None, Some(album_id)) => library::album_photos(ctx, owner, album_id)?,
                (None, None) => library::list_photos(ctx, owner)?,
                (Some(_), Some(_)) => bail!("Pass either --event or --album, not both"),
            };
            print_json(&photos)?;
        }
        "delete" => {
            let a = CommandArgs::parse(args, &[], &[])?;
            a.expect(1, "delete PHOTO_ID")?;
            let owner = owner(cli)?;
            let photo = library::get_photo(ctx, owner, &a.positional[0])?;
            let outcome = pipeline::delete_photo(
                ctx,
                owner,
                &photo.id,
                &photo.storage_path,
                photo.event_id.as_deref(),
            )?;
            print_json(&outcome)?;
        }
        "search" => {
            let a = CommandArgs::parse(args, &[], &[])?;
            a.expect_at_least(1, "search QUERY...")?;
            let hits = pipeline::search_by_text(ctx, owner(cli)?, &a.positional.join(" "))?;
            for hit in &hits {
                println!("{:.3}\t{}\t{}", hit.similarity, hit.photo.id, hit.photo.name);
            }
        }
        "face-add" => {
            let a = CommandArgs::parse(args, &[], &[])?;
            a.expect(2, "face-add NAME IMAGE_URL")?;
            let profile = pipeline::create_face_profile(ctx, owner(cli)?, &a.positional[0], &a.positional[1])?;
            print_json(&profile)?;
        }
        "face-list" => {
            print_json(&pipeline::list_face_profiles(ctx, owner(cli)?)?)?;
        }
        "face-delete" => {
            let a = CommandArgs::parse(args, &[], &[])?;
            a.expect(1, "face-delete PROFILE_ID")?;
            pipeline::delete_face_profile(ctx, owner(cli)?, &a.positional[0])?;
        }
        "face-search" => {
            let a = CommandArgs::parse(args, &[], &[])?;
            a.expect(1, "face-search FACE_ID")?;
            print_json(&pipeline::search_by_face(ctx, owner(cli)?, &a.positional[0])?)?;
        }
        "album-create" => {
            let a = CommandArgs::parse(args, &["--description"], &["--public"])?;
            a.expect(1, "album-create NAME [--description TEXT] [--public]")?;
            let album = library::create_album(
                ctx,
                owner(cli)?,
                &a.positional[0],
                a.option("--description"),
                a.flag("--public"),
            )?;
            print_json(&album)?;
        }
        "album-list" => {
            print_json(&library::list_albums(ctx, owner(cli)?)?)?;
        }
        "album-add" => {
            let a = CommandArgs::parse(args, &[], &[])?;
            a.expect_at_least(2, "album-add ALBUM_ID PHOTO_ID...")?;
            let added = library::add_photos_to_album(ctx, owner(cli)?, &a.positional[0], &a.positional[1..])?;
            println!("{} photos added", added);
        }
        "album-cover" => {
            let a = CommandArgs::parse(args, &[], &[])?;
            a.expect(2, "album-cover ALBUM_ID IMAGE_URL")?;
            library::update_album_cover(ctx, owner(cli)?, &a.positional[0], &a.positional[1])?;
        }
        "album-delete" => {
            let a = CommandArgs::parse(args, &[], &[])?;
            a.expect(1, "album-delete ALBUM_ID")?;
            let detached = pipeline::delete_album(ctx, owner(cli)?, &a.positional[0])?;
            println!("Album deleted, {} photos detached", detached);
        }
        "event-create" => {
            let a = CommandArgs::parse(args, &["--description", "--location"], &["--public"])?;
            a.expect(2, "event-create NAME YYYY-MM-DD [--description TEXT] [--location TEXT] [--public]")?;
            let new_event = NewEvent {
                name: a.positional[0].clone(),
                date: parse_date(&a.positional[1])?,
                description: a.option("--description").map(str::to_string),
                location: a.option("--location").map(str::to_string),
                is_public: a.flag("--public"),
            };
            print_json(&library::create_event(ctx, owner(cli)?, &new_event)?)?;
        }
        "event-list" => {
            print_json(&library::list_events(ctx, owner(cli)?)?)?;
        }
        "event-update" => {
            let a = CommandArgs::parse(
                args,
                &["--name", "--date", "--description", "--location", "--cover"],
                &["--public", "--private"],
            )?;
            a.expect(1, "event-update EVENT_ID [OPTIONS]")?;
            let is_public = match (a.flag("--public"), a.flag("--private")) {
                (true, true) => bail!("Pass either --public or --private, not both"),
                (true, false) => Some(true),
                (false, true) => Some(false),
                (false, false) => None,
            };
            let update = EventUpdate {
                name: a.option("--name").map(str::to_string),
                date: a.option("--date").map(parse_date).transpose()?,
                description: a.option("--description").map(str::to_string),
                location: a.option("--location").map(str::to_string),
                is_public,
                cover_image_url: a.option("--cover").map(str::to_string),
            };
            print_json(&library::update_event(ctx, owner(cli)?, &a.positional[0], &update)?)?;
        }
        "event-delete" => {
            let a = CommandArgs::parse(args, &[], &[])?;
            a.expect(1, "event-delete EVENT_ID")?;
            let removed = pipeline::delete_event(ctx, owner(cli)?, &a.positional[0])?;
            println!("Event deleted with {} photos", removed);
        }
        "share" => {
            let a = CommandArgs::parse(args, &["--expires-days"], &["--face-auth"])?;
            a.expect(1, "share EVENT_ID [--face-auth] [--expires-days N]")?;
            let expires_in_days = a
                .option("--expires-days")
                .map(|d| d.parse::<u32>().with_context(|| format!("Invalid day count: {}", d)))
                .transpose()?;
            let link = pipeline::create_shareable_link(
                ctx,
                owner(cli)?,
                &a.positional[0],
                a.flag("--face-auth"),
                expires_in_days,
            )?;
            print_json(&link)?;
        }
        "access" => {
            let a = CommandArgs::parse(args, &["--selfie"], &[])?;
            a.expect(1, "access SHARE_CODE [--selfie PATH|URL]")?;
            let selfie = match a.option("--selfie") {
                Some(s) if s.contains("://") || s.starts_with("data:") => Some(s.to_string()),
                Some(path) => Some(sharing::selfie_data_url(Path::new(path))?),
                None => None,
            };
            let decision = pipeline::check_link_access(ctx, &a.positional[0], selfie.as_deref())?;
            print_json(&decision)?;
        }
        "download" => {
            let a = CommandArgs::parse(args, &[], &[])?;
            a.expect(1, "download EVENT_ID")?;
            print_json(&pipeline::prepare_download(ctx, &a.positional[0])?)?;
        }
        "reconcile" => {
            let a = CommandArgs::parse(args, &[], &["--repair"])?;
            a.expect(0, "reconcile [--repair]")?;
            print_json(&pipeline::reconcile(ctx, owner(cli)?, a.flag("--repair"))?)?;
        }
        "export" => {
            let a = CommandArgs::parse(args, &["--event", "--format"], &[])?;
            a.expect(1, "export PATH [--event ID] [--format json|csv]")?;
            let path = PathBuf::from(&a.positional[0]);
            let format = match a.option("--format") {
                Some(f) => f.parse::<ExportFormat>()?,
                None if path.extension().is_some_and(|e| e == "csv") => ExportFormat::Csv,
                None => ExportFormat::Json,
            };
            let count = export::export_photos(&ctx.db, owner(cli)?, a.option("--event"), &path, format)?;
            println!("Exported {} photos to {} ({})", count, path.display(), format.extension());
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}
