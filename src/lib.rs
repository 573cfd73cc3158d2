#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

#[macro_use]
mod macros;
pub mod analyzer;
pub mod limits;
pub mod locks;
pub mod malleability;
pub mod parser;
#[cfg(feature = "satisfy")]
pub mod satisfy;
pub mod script;
pub mod serialize;
pub mod type_checker;

pub extern crate alloc;

//

use alloc::string::String;

use crate::analyzer::{Analysis, AnalysisError, AnalyzerContext};
use crate::parser::{ParseError, ParserContext};

#[cfg_attr(feature = "debug", derive(Debug))]
pub enum MiniscriptError<'a> {
    Parse(ParseError<'a>),
    #[cfg(feature = "satisfy")]
    Satisfy(satisfy::SatisfyError),
}

/// Compiled expression. `asm` is produced for every well-formed input;
/// the sanity flags and `error` report what the analyzer thinks of it.
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct Compiled {
    pub asm: String,
    pub issane: bool,
    pub issanesublevel: bool,
    pub error: Option<AnalysisError>,
}

pub fn compile<'a>(
    expr: &'a str,
    options: &AnalyzerContext,
) -> Result<Compiled, ParseError<'a>> {
    let ctx = parser::parse(expr)?;
    let analysis = analyzer::analyze_ast(&ctx, options);
    Ok(Compiled {
        asm: script::build_script(&ctx),
        issane: analysis.issane,
        issanesublevel: analysis.issanesublevel,
        error: analysis.error,
    })
}

pub fn analyze<'a>(
    expr: &'a str,
    options: &AnalyzerContext,
) -> Result<Analysis<'a>, ParseError<'a>> {
    let ctx: ParserContext<'a> = parser::parse(expr)?;
    Ok(analyzer::analyze_ast(&ctx, options))
}

/// Enumerate all satisfactions of a sane expression, classified by
/// malleability and caller knowledge.
#[cfg(feature = "satisfy")]
pub fn satisfy<'a>(
    expr: &'a str,
    options: &satisfy::SatisfyOptions,
) -> Result<satisfy::Satisfied, MiniscriptError<'a>> {
    let ctx = parser::parse(expr).map_err(MiniscriptError::Parse)?;
    ctx.satisfy(options).map_err(MiniscriptError::Satisfy)
}
