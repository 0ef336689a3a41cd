//-
// Copyright (c) 2026, Jason Lingle
//
// This file is part of Nested Mailmap.
//
// Nested Mailmap is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Nested Mailmap is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Nested Mailmap. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use structopt::StructOpt;

use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    /// Run the mail-map server.
    ///
    /// The server listens on the address configured in `mailmap.toml` and
    /// answers postfix `tcp_table` lookups until it is killed.
    Serve(ServerCommonOptions),
    /// Load and validate the configuration, then print a summary.
    ///
    /// This reads the places file and every configured domain source, so a
    /// clean run means `serve` will start with the same files.
    CheckConfig(ServerCommonOptions),
    Query(QuerySubcommand),
}

#[derive(StructOpt, Default)]
pub(super) struct ServerCommonOptions {
    /// The directory containing `mailmap.toml` etc
    /// [default: /etc/nested-mailmap or /usr/local/etc/nested-mailmap]
    #[structopt(long, parse(from_os_str))]
    root: Option<PathBuf>,
}

/// Send one request to a running server and print the response.
///
/// Exits with status 0 only if the server answers 200.
#[derive(StructOpt)]
pub(super) struct QuerySubcommand {
    /// The host to connect to
    #[structopt(long, short, default_value = "127.0.0.1")]
    pub(super) host: String,
    /// The port to connect to
    #[structopt(long, short, default_value = "2374")]
    pub(super) port: u16,
    /// The delimiter between the command and the address
    #[structopt(long, default_value = " ")]
    pub(super) delimiter: char,
    /// The command to send, normally `get`
    pub(super) command: String,
    /// The address to look up
    pub(super) address: String,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        }
    });

    match cmd {
        Command::Serve(common) => {
            let (system_config, root) = load_config(common);
            configure_logging(&root);
            super::serve::serve(system_config, root);
        }
        Command::CheckConfig(common) => {
            let (system_config, root) = load_config(common);
            crate::init_simple_log();
            super::check::check_config(&system_config, &root);
        }
        Command::Query(cmd) => super::query::query(cmd),
    }
}

fn load_config(common: ServerCommonOptions) -> (SystemConfig, PathBuf) {
    let root = common.root.unwrap_or_else(|| {
        if Path::new("/etc/nested-mailmap/mailmap.toml").is_file() {
            "/etc/nested-mailmap".to_owned().into()
        } else if Path::new("/usr/local/etc/nested-mailmap/mailmap.toml")
            .is_file()
        {
            "/usr/local/etc/nested-mailmap".to_owned().into()
        } else {
            eprintln!(
                "Neither /etc/nested-mailmap nor\n\
                 /usr/local/etc/nested-mailmap contains mailmap.toml;\n\
                 use --root=/path/to/config if your installation is\n\
                 elsewhere."
            );
            EX_CONFIG.exit()
        }
    });

    let system_config_path = root.join("mailmap.toml");
    let mut system_config_toml = Vec::new();
    if let Err(e) = fs::File::open(&system_config_path)
        .and_then(|mut f| f.read_to_end(&mut system_config_toml))
    {
        eprintln!("Error reading '{}': {}", system_config_path.display(), e);
        EX_CONFIG.exit();
    }

    let system_config: SystemConfig =
        match toml::from_slice(&system_config_toml) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Error in config file at '{}': {}",
                    system_config_path.display(),
                    e
                );
                EX_CONFIG.exit()
            }
        };

    (system_config, root)
}

fn configure_logging(root: &Path) {
    if Ok(true) == nix::unistd::isatty(2) {
        // Running interactively; ignore logging configuration and just write
        // to stderr.
        crate::init_simple_log();
        return;
    }

    // log4rs *or* syslog; there is no maintained log4rs syslog appender.
    let log_config_file = root.join("logging.toml");
    let result = if log_config_file.is_file() {
        log4rs::init_file(
            &log_config_file,
            log4rs::file::Deserializers::new(),
        )
        .map_err(|e| e.to_string())
    } else {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_MAIL,
            hostname: None,
            process: env!("CARGO_PKG_NAME").to_owned(),
            pid: nix::unistd::getpid().as_raw(),
        };

        syslog::unix(formatter)
            .map_err(|e| e.to_string())
            .and_then(|logger| {
                log::set_boxed_logger(Box::new(syslog::BasicLogger::new(
                    logger,
                )))
                .map(|_| log::set_max_level(log::LevelFilter::Info))
                .map_err(|e| e.to_string())
            })
    };

    if let Err(e) = result {
        eprintln!("Failed to initialise logging: {}", e);
        EX_SOFTWARE.exit();
    }
}
