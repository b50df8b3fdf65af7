//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tagscan_scanner::ScanConfig;

/// Discover, identify and read contactless tags.
#[derive(Parser, Debug)]
#[command(name = "tagscan")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// JSON scan config file; flags below override it
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tag family to sense, in priority order (repeatable)
    #[arg(short, long = "family", value_name = "NAME")]
    pub families: Vec<String>,

    /// Milliseconds to wait for a tag to leave the field
    #[arg(short, long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Stop after the first tag
    #[arg(long)]
    pub once: bool,

    /// USB reader index (shorthand for `--reader usb:<INDEX>`)
    #[arg(short, long, value_name = "INDEX", conflicts_with = "reader")]
    pub device: Option<u32>,

    /// Reader connection string: `usb`, `usb:<index>`, `sim` or `sim:<scenario.json>`
    #[arg(
        short,
        long,
        value_name = "CONNECTION",
        env = "TAGSCAN_READER",
        default_value = "usb"
    )]
    pub reader: String,

    /// Print one JSON object per record instead of a summary
    #[arg(long)]
    pub json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Connection string of the reader to open.
    pub fn connection(&self) -> String {
        match self.device {
            Some(index) => format!("usb:{index}"),
            None => self.reader.clone(),
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Apply flag overrides on top of a loaded config.
    pub fn apply(&self, config: &mut ScanConfig) {
        if !self.families.is_empty() {
            config.families.clone_from(&self.families);
        }
        if let Some(timeout) = self.timeout {
            config.removal_timeout_ms = timeout;
        }
        if self.once {
            config.max_records = Some(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("tagscan").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.connection(), "usb");
        assert!(!args.json);
        assert_eq!(args.log_filter(), "info");

        let mut config = ScanConfig::default();
        args.apply(&mut config);
        assert_eq!(config, ScanConfig::default());
    }

    #[test]
    fn test_overrides_apply_on_top_of_config() {
        let args = parse(&["-f", "felica", "--family", "mifare", "-t", "5000", "--once"]);
        let mut config = ScanConfig {
            families: vec!["vicinity".into()],
            ..ScanConfig::default()
        };

        args.apply(&mut config);

        assert_eq!(config.families, ["felica", "mifare"]);
        assert_eq!(config.removal_timeout_ms, 5000);
        assert_eq!(config.max_records, Some(1));
    }

    #[rstest]
    #[case(&["--device", "2"], "usb:2")]
    #[case(&["-r", "sim"], "sim")]
    #[case(&["--reader", "sim:demo.json"], "sim:demo.json")]
    fn test_connection(#[case] argv: &[&str], #[case] expected: &str) {
        assert_eq!(parse(argv).connection(), expected);
    }

    #[test]
    fn test_device_conflicts_with_reader() {
        let result = Args::try_parse_from(["tagscan", "--device", "0", "--reader", "sim"]);
        assert!(result.is_err());
    }

    #[rstest]
    #[case(&["-v"], "debug")]
    #[case(&["-vvv"], "trace")]
    fn test_verbosity(#[case] argv: &[&str], #[case] expected: &str) {
        assert_eq!(parse(argv).log_filter(), expected);
    }
}
