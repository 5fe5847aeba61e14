use clap::{crate_version, App, AppSettings, Arg, SubCommand};
use minipress::logger;
use minipress::site::Site;
use minipress::watch;
use std::path::Path;

fn path_arg() -> Arg<'static, 'static> {
    Arg::with_name("path")
        .help("Path to the site root (the directory containing site.ini)")
        .default_value(".")
}

fn local_arg() -> Arg<'static, 'static> {
    Arg::with_name("local")
        .long("local")
        .help("Use file:// URLs pointing at the output directory instead of the configured site url")
}

fn main() {
    let matches = App::new("minipress")
        .version(crate_version!())
        .about("A small static site generator")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("build")
                .about("Builds the site into its output directory")
                .arg(path_arg())
                .arg(local_arg()),
        )
        .subcommand(
            SubCommand::with_name("watch")
                .about("Builds the site, then rebuilds changed files until interrupted")
                .arg(path_arg())
                .arg(local_arg()),
        )
        .subcommand(
            SubCommand::with_name("init")
                .about("Scaffolds a new site")
                .arg(path_arg()),
        )
        .subcommand(
            SubCommand::with_name("add")
                .about("Creates a new draft entry in the content directory")
                .arg(path_arg()),
        )
        .get_matches();

    let result = match matches.subcommand() {
        ("build", Some(sub)) => build(
            Path::new(sub.value_of("path").unwrap_or(".")),
            sub.is_present("local"),
            false,
        ),
        ("watch", Some(sub)) => build(
            Path::new(sub.value_of("path").unwrap_or(".")),
            sub.is_present("local"),
            true,
        ),
        ("init", Some(sub)) => init(Path::new(sub.value_of("path").unwrap_or("."))),
        ("add", Some(sub)) => add(Path::new(sub.value_of("path").unwrap_or("."))),
        _ => unreachable!("subcommand is required"),
    };

    if let Err(err) = result {
        logger::error(&err.to_string());
        std::process::exit(1);
    }
}

fn build(root: &Path, local: bool, watch_mode: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut site = Site::load(root, local)?;
    site.scan()?;
    let emitted = site.emit();
    logger::info(&format!("done, {} files processed", emitted));
    if watch_mode {
        watch::run(&mut site)?;
    }
    Ok(())
}

fn init(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let root = Site::init(root)?;
    logger::info(&format!("new site created at {}", root.display()));
    Ok(())
}

fn add(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let site = Site::load(root, false)?;
    let path = site.add_entry()?;
    logger::info(&format!("new entry created at {}", path.display()));
    Ok(())
}
