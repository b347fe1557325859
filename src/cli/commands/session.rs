use clap::{Arg, ArgAction, ArgMatches, Command, builder::ValueParser};
use secrecy::SecretString;

pub const ARG_REDIS_URL: &str = "redis-url";
pub const ARG_REDIS_TIMEOUT_MS: &str = "redis-timeout-ms";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_HISTORY_LIMIT: &str = "history-limit";
pub const ARG_TRUST_DECAY: &str = "trust-decay";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";

/// Session store and risk settings.
#[derive(Debug, Clone)]
pub struct Options {
    pub redis_url: Option<SecretString>,
    pub redis_timeout_ms: u64,
    pub session_ttl_seconds: u64,
    pub history_limit: usize,
    pub trust_decay: f64,
    pub cookie_secure: bool,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is missing or out of range.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_u64 = |id: &str| -> anyhow::Result<u64> {
            matches
                .get_one::<u64>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        let history_limit = usize::try_from(read_u64(ARG_HISTORY_LIMIT)?)
            .map_err(|_| anyhow::anyhow!("--{ARG_HISTORY_LIMIT} is too large"))?;

        let trust_decay = matches
            .get_one::<f64>(ARG_TRUST_DECAY)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_TRUST_DECAY}"))?;

        Ok(Self {
            redis_url: matches
                .get_one::<String>(ARG_REDIS_URL)
                .filter(|url| !url.trim().is_empty())
                .map(|url| SecretString::from(url.clone())),
            redis_timeout_ms: read_u64(ARG_REDIS_TIMEOUT_MS)?,
            session_ttl_seconds: read_u64(ARG_SESSION_TTL_SECONDS)?,
            history_limit,
            trust_decay,
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
        })
    }
}

#[must_use]
pub fn validator_trust_decay() -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<f64, String> {
        let decay = value
            .parse::<f64>()
            .map_err(|_| "trust decay must be a number".to_string())?;

        if (0.0..=1.0).contains(&decay) {
            Ok(decay)
        } else {
            Err("trust decay must be between 0.0 and 1.0".to_string())
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_REDIS_URL)
                .long(ARG_REDIS_URL)
                .help("Redis URL for sessions and device history")
                .long_help(
                    "Redis URL for sessions and device history, e.g. redis://:password@host:6379/0. When omitted, sessions are kept in process memory and lost on restart.",
                )
                .env("GUARDIAN_REDIS_URL")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_REDIS_TIMEOUT_MS)
                .long(ARG_REDIS_TIMEOUT_MS)
                .help("Timeout for each Redis command in milliseconds")
                .default_value("2000")
                .env("GUARDIAN_REDIS_TIMEOUT_MS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds, refreshed on every write")
                .default_value("86400")
                .env("GUARDIAN_SESSION_TTL_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_HISTORY_LIMIT)
                .long(ARG_HISTORY_LIMIT)
                .help("Fingerprints kept per user for history trust")
                .default_value("10")
                .env("GUARDIAN_HISTORY_LIMIT")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_TRUST_DECAY)
                .long(ARG_TRUST_DECAY)
                .help("Trust multiplier applied on medium-risk fingerprint drift")
                .default_value("0.8")
                .env("GUARDIAN_TRUST_DECAY")
                .value_parser(validator_trust_decay()),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure (HTTPS only)")
                .env("GUARDIAN_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}
