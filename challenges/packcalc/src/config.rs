use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "packcalc")]
#[command(about = "Pack calculator: ship at least N items in as few items, then as few packs, as possible", long_about = None)]
pub struct Config {
    /// Port to listen on
    #[arg(short = 'p', long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Default catalog used when a request names no sizes, e.g. "250,500,1000"
    #[arg(long, env = "PACK_SIZES")]
    pub pack_sizes: Option<PackSizes>,

    /// Largest item count, and largest pack size, a request may ask for
    #[arg(long, env = "MAX_ITEMS", default_value_t = 1_000_000)]
    pub max_items: i64,

    /// Largest number of distinct pack sizes in one request
    #[arg(long, env = "MAX_PACK_SIZES", default_value_t = 100)]
    pub max_sizes: usize,

    /// Static page served for every path outside the API
    #[arg(long, env = "UI_PATH", default_value = "web/index.html")]
    pub ui: PathBuf,
}

impl Config {
    pub fn default_sizes(&self) -> &[i64] {
        self.pack_sizes
            .as_ref()
            .map(|sizes| sizes.0.as_slice())
            .unwrap_or_default()
    }
}

/// Comma separated pack sizes. An empty string is an empty catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackSizes(pub Vec<i64>);

impl FromStr for PackSizes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(PackSizes::default());
        }
        parse_sizes_csv(s).map(PackSizes)
    }
}

/// Parses "250, 500,1000". Blank entries are skipped; anything else must be a positive integer.
pub fn parse_sizes_csv(csv: &str) -> Result<Vec<i64>, String> {
    if csv.trim().is_empty() {
        return Err("sizes string empty".to_string());
    }
    let mut out = Vec::new();
    for part in csv.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<i64>() {
            Ok(v) if v > 0 => out.push(v),
            _ => return Err(format!("invalid size: {:?}", part)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sizes_csv() {
        assert_eq!(parse_sizes_csv("250,500, 1000"), Ok(vec![250, 500, 1000]));
        assert_eq!(parse_sizes_csv("5,,10,"), Ok(vec![5, 10]));
        assert_eq!(parse_sizes_csv(" "), Err("sizes string empty".to_string()));
        assert_eq!(parse_sizes_csv("5,x"), Err("invalid size: \"x\"".to_string()));
        assert_eq!(parse_sizes_csv("5,-1"), Err("invalid size: \"-1\"".to_string()));
        assert_eq!(parse_sizes_csv("0"), Err("invalid size: \"0\"".to_string()));
    }

    #[test]
    fn test_pack_sizes_from_str() {
        assert_eq!("".parse::<PackSizes>(), Ok(PackSizes(vec![])));
        assert_eq!("250,500".parse::<PackSizes>(), Ok(PackSizes(vec![250, 500])));
        assert!("250,abc".parse::<PackSizes>().is_err());
    }

    #[test]
    fn test_cli() {
        let config = Config::try_parse_from([
            "packcalc",
            "-p",
            "9000",
            "--pack-sizes",
            "23,31,53",
            "--max-items",
            "5000",
            "--ui",
            "/tmp/index.html",
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.default_sizes(), &[23, 31, 53]);
        assert_eq!(config.max_items, 5000);
        assert_eq!(config.ui, PathBuf::from("/tmp/index.html"));

        assert!(Config::try_parse_from(["packcalc", "--pack-sizes", "1,-2"]).is_err());
    }
}
