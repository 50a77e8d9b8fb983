use spinstats::SessionRegistry;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct CliArgs {
    dir: Option<PathBuf>,
    level: Option<String>,
    sort: Option<String>,
    order: Option<String>,
    search: Option<String>,
    detail: Option<(String, String)>,
    monthly: bool,
    overview: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spinstats=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1).collect())?;
    let Some(dir) = args.dir.clone() else {
        anyhow::bail!("missing export directory (see --help)");
    };

    let settings = spinstats::config::load_or_init_settings().unwrap_or_else(|err| {
        tracing::warn!(error = %format!("{err:#}"), "using default settings");
        spinstats::model::EngineSettings::default()
    });
    let files = spinstats::library::read_export_dir(&dir, &settings)?;
    let registry = SessionRegistry::new(settings);
    let session = registry.load_bytes(files)?;
    tracing::debug!(
        session = %session.id(),
        created_at = %session.created_at(),
        demo_months = session.settings().demo_months,
        "session ready"
    );

    println!("{}", render(&registry, &args)?);
    Ok(())
}

fn render(registry: &SessionRegistry, args: &CliArgs) -> anyhow::Result<String> {
    let level = args.level.as_deref().unwrap_or("song");

    let json = if args.overview {
        serde_json::to_string_pretty(&registry.overview()?)?
    } else if args.monthly {
        serde_json::to_string_pretty(&*registry.monthly_top()?)?
    } else if let Some((kind, name)) = &args.detail {
        serde_json::to_string_pretty(&registry.detail(kind, name)?)?
    } else if let Some(query) = &args.search {
        serde_json::to_string_pretty(&registry.search(level, query)?)?
    } else if args.sort.is_some() || args.order.is_some() {
        let column = args.sort.as_deref().unwrap_or("Plays");
        let order = args.order.as_deref().unwrap_or("desc");
        serde_json::to_string_pretty(&*registry.sorted(level, column, order)?)?
    } else {
        serde_json::to_string_pretty(&*registry.aggregation(level)?)?
    };
    Ok(json)
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--level" => out.level = Some(take_value(&args, &mut index, "--level")?),
            "--sort" => out.sort = Some(take_value(&args, &mut index, "--sort")?),
            "--order" => out.order = Some(take_value(&args, &mut index, "--order")?),
            "--search" => out.search = Some(take_value(&args, &mut index, "--search")?),
            "--detail" => {
                let kind = take_value(&args, &mut index, "--detail")?;
                let name = take_value(&args, &mut index, "--detail")?;
                out.detail = Some((kind, name));
            }
            "--monthly" => out.monthly = true,
            "--overview" => out.overview = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with("--") => anyhow::bail!("unknown argument {other}"),
            other => {
                if out.dir.is_some() {
                    anyhow::bail!("unexpected extra argument {other}");
                }
                out.dir = Some(PathBuf::from(other));
            }
        }
        index += 1;
    }
    Ok(out)
}

fn take_value(args: &[String], index: &mut usize, flag: &str) -> anyhow::Result<String> {
    *index += 1;
    let Some(value) = args.get(*index) else {
        anyhow::bail!("{flag} requires a value");
    };
    if value.trim().is_empty() {
        anyhow::bail!("{flag} cannot be empty");
    }
    Ok(value.clone())
}

fn print_help() {
    println!("spinstats <EXPORT_DIR> [options]");
    println!("  --level song|album|artist   Aggregation level (default song)");
    println!("  --sort COLUMN               Sort by column, e.g. Plays or \"Minutes Played\"");
    println!("  --order asc|desc            Sort direction (default desc with --sort)");
    println!("  --search TEXT               Filter the level by text");
    println!("  --detail album|artist NAME  Songs of one album or artist");
    println!("  --monthly                   Most played song per month");
    println!("  --overview                  Totals for the loaded history");
}
