use restock::config::RestockConfig;
use restock::core::token::generate_token;
use restock::sync::tokens::TokenCache;

enum Command {
    List,
    New,
    Use(String),
    Forget(String),
    Clear,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut iter = args.iter().skip(1);
    let Some(flag) = iter.next() else {
        return Ok(Command::List);
    };
    let value = |name: &str, v: Option<&String>| {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("{} needs a list token", name))
    };
    match flag.as_str() {
        "--list" => Ok(Command::List),
        "--new" => Ok(Command::New),
        "--use" => value("--use", iter.next()).map(Command::Use),
        "--forget" => value("--forget", iter.next()).map(Command::Forget),
        "--clear" => Ok(Command::Clear),
        other => Err(format!("Unknown option {}", other)),
    }
}

fn init_logging(config: &RestockConfig) {
    // Journal output (`journalctl --user -t restock -f`): this crate at
    // info/debug per config, everything else at warn.
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("restock") {
                let max = if restock::debug_logging() { log::LevelFilter::Debug } else { log::LevelFilter::Info };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    restock::set_debug_logging(config.debug_logging);

    match systemd_journal_logger::JournalLog::new() {
        Ok(journal) => {
            let journal = journal.with_syslog_identifier("restock".to_string());
            if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
                log::set_max_level(log::LevelFilter::Debug);
            }
        }
        Err(e) => eprintln!("Journal logging unavailable: {}", e),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RestockConfig::load(&RestockConfig::default_path());
    init_logging(&config);
    config.ensure_dirs()?;

    let args: Vec<String> = std::env::args().collect();
    let command = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Usage: restock [--list | --new | --use TOKEN | --forget TOKEN | --clear]");
            std::process::exit(2);
        }
    };

    let mut cache = TokenCache::load(config.token_store());

    match command {
        Command::List => {}
        Command::New => {
            let token = generate_token();
            cache.add(&token);
            cache.set_active(Some(&token));
            println!("Created list: {}", token);
        }
        Command::Use(token) => {
            cache.add(&token);
            cache.set_active(Some(&token));
        }
        Command::Forget(token) => {
            if !cache.remove(&token) {
                println!("\"{}\" is not a saved list", token);
            } else if cache.active() == Some(token.as_str()) {
                cache.set_active(None);
            }
        }
        Command::Clear => cache.set_active(None),
    }

    if cache.list().is_empty() {
        println!("No saved lists. Create one with --new.");
    }
    for token in cache.list() {
        let marker = if cache.active() == Some(token.as_str()) { "*" } else { " " };
        println!("{} {}", marker, token);
    }

    Ok(())
}
