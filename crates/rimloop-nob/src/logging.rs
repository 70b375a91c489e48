//! Leveled diagnostics on stderr.
//!
//! Everything in the workspace logs through `tracing`. This module installs
//! a subscriber that prints one line per event as `[LEVEL] message`, with
//! optionally coloured prefixes.

use std::fmt;
use std::io;

use tracing::{ Event, Level, Subscriber };
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{ FmtContext, FormatEvent, FormatFields };
use tracing_subscriber::registry::LookupSpan;

use crate::config::Config;


/// Event formatter producing `[INFO] message` lines.
#[derive( Debug, Clone, Copy )]
pub struct NobFormat {
    color: bool,
}


impl NobFormat {
    pub fn new( color: bool ) -> Self {
        Self { color }
    }


    /// Level prefix, including the trailing space.
    pub fn prefix( &self, level: Level ) -> &'static str {
        let ( plain, colored ) = if level == Level::ERROR {
            ( "[ERROR] ", "\x1b[1;91m[ERROR] \x1b[0m" )
        } else if level == Level::WARN {
            ( "[WARNING] ", "\x1b[1;33m[WARNING] \x1b[0m" )
        } else if level == Level::INFO {
            ( "[INFO] ", "\x1b[1;32m[INFO] \x1b[0m" )
        } else {
            ( "[DEBUG] ", "[DEBUG] " )
        };

        if self.color { colored } else { plain }
    }
}


impl<S, N> FormatEvent<S, N> for NobFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!( writer, "{}", self.prefix( *event.metadata().level() ) )?;
        ctx.field_format().format_fields( writer.by_ref(), event )?;
        writeln!( writer )
    }
}


/// Installs the stderr subscriber described by `config`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init( config: &Config ) {
    let level = if config.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };

    let _ = tracing_subscriber::fmt()
        .with_writer( io::stderr )
        .with_ansi( config.color_log )
        .with_max_level( level )
        .event_format( NobFormat::new( config.color_log ) )
        .try_init();
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_plain_prefixes() {
        let format = NobFormat::new( false );
        assert_eq!( format.prefix( Level::INFO ), "[INFO] " );
        assert_eq!( format.prefix( Level::WARN ), "[WARNING] " );
        assert_eq!( format.prefix( Level::ERROR ), "[ERROR] " );
        assert_eq!( format.prefix( Level::DEBUG ), "[DEBUG] " );
        assert_eq!( format.prefix( Level::TRACE ), "[DEBUG] " );
    }


    #[test]
    fn test_colored_prefixes() {
        let format = NobFormat::new( true );
        assert!( format.prefix( Level::ERROR ).contains( "[ERROR]" ) );
        assert!( format.prefix( Level::ERROR ).starts_with( "\x1b[" ) );
        assert_eq!( format.prefix( Level::DEBUG ), "[DEBUG] " );
    }
}
