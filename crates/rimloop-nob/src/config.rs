//! Runtime configuration.
//!
//! Build scripts are configured from the environment so that the same
//! binary can be tuned without recompiling it (which would trigger a
//! self-rebuild).

use crate::temp::DEFAULT_TEMP_CAPACITY;


/// Knobs read from `NOB_*` environment variables.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct Config {
    /// Size of the temporary arena in bytes (`NOB_TEMP_CAPACITY`).
    pub temp_capacity: usize,

    /// Colour the level prefixes of log lines (`NOB_COLOR_LOG`, default on).
    pub color_log: bool,

    /// Emit debug lines, such as per-file copies (`NOB_VERBOSE`).
    pub verbose: bool,

    /// Command line used to rebuild a build script (`NOB_REBUILD_CC`).
    ///
    /// Whitespace separated; the words `{binary}` and `{source}` are
    /// replaced by the binary and source paths.
    pub rebuild_cc: Option<String>,
}


impl Default for Config {
    fn default() -> Self {
        Self {
            temp_capacity: DEFAULT_TEMP_CAPACITY,
            color_log: true,
            verbose: false,
            rebuild_cc: None,
        }
    }
}


impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup( |key| std::env::var( key ).ok() )
    }


    /// Reads the configuration through `lookup`, falling back to defaults
    /// for unset or unparsable values.
    pub fn from_lookup<F>( lookup: F ) -> Self
    where
        F: Fn( &str ) -> Option<String>,
    {
        let defaults = Self::default();

        let temp_capacity = lookup( "NOB_TEMP_CAPACITY" )
            .and_then( |v| v.trim().parse().ok() )
            .unwrap_or( defaults.temp_capacity );

        let color_log = lookup( "NOB_COLOR_LOG" )
            .map( |v| parse_flag( &v ) )
            .unwrap_or( defaults.color_log );

        let verbose = lookup( "NOB_VERBOSE" )
            .map( |v| parse_flag( &v ) )
            .unwrap_or( defaults.verbose );

        let rebuild_cc = lookup( "NOB_REBUILD_CC" )
            .filter( |v| !v.trim().is_empty() );

        Self { temp_capacity, color_log, verbose, rebuild_cc }
    }
}


fn parse_flag( value: &str ) -> bool {
    !matches!( value.trim().to_lowercase().as_str(), "" | "0" | "false" | "no" | "off" )
}


#[cfg( test )]
mod tests {
    use std::collections::HashMap;

    use super::*;


    fn lookup( vars: &[( &str, &str )] ) -> impl Fn( &str ) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map( |( k, v )| ( k.to_string(), v.to_string() ) )
            .collect();
        move |key| map.get( key ).cloned()
    }


    #[test]
    fn test_defaults_when_unset() {
        assert_eq!( Config::from_lookup( lookup( &[] ) ), Config::default() );
    }


    #[test]
    fn test_reads_overrides() {
        let config = Config::from_lookup( lookup( &[
            ( "NOB_TEMP_CAPACITY", "65536" ),
            ( "NOB_COLOR_LOG", "0" ),
            ( "NOB_VERBOSE", "yes" ),
            ( "NOB_REBUILD_CC", "cargo build --bin nob" ),
        ] ) );

        assert_eq!( config.temp_capacity, 65536 );
        assert!( !config.color_log );
        assert!( config.verbose );
        assert_eq!( config.rebuild_cc.as_deref(), Some( "cargo build --bin nob" ) );
    }


    #[test]
    fn test_bad_values_fall_back() {
        let config = Config::from_lookup( lookup( &[
            ( "NOB_TEMP_CAPACITY", "lots" ),
            ( "NOB_REBUILD_CC", "   " ),
        ] ) );

        assert_eq!( config.temp_capacity, DEFAULT_TEMP_CAPACITY );
        assert_eq!( config.rebuild_cc, None );
    }
}
