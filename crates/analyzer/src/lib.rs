//! # nbflow analyzer
//!
//! Tree-sitter based analysis of a single notebook code fragment.
//!
//! ## Philosophy
//!
//! Each fragment is parsed once and walked once. The walk records:
//! - Names written (assignment targets, loop targets, `def`/`class` names)
//! - Names read (everything else that is a bare identifier)
//! - Names mutated in place (`obj.method(inplace=True)`, `obj[key] = ...`)
//! - Names purely overwritten (assigned without being read on the right)
//!
//! ## Architecture
//!
//! ```text
//! Fragment text
//!     │
//!     ├──> Strip `%magic` and `!shell` lines
//!     │
//!     ├──> Tree-sitter Parsing → AST
//!     │
//!     ├──> Name collection (single traversal)
//!     │    ├─> defined / used / mutated / pure overwrites
//!     │    ├─> imported aliases (never a data dependency)
//!     │    └─> `spec = {...}` candidates
//!     │
//!     ├──> Embedded spec extraction
//!     │    ├─> literal evaluation
//!     │    └─> stub chart evaluation (best effort)
//!     │
//!     └──> Categorization (ordered rule list)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use nbflow_analyzer::{AnalyzerConfig, Category, FragmentAnalyzer};
//!
//! let mut analyzer = FragmentAnalyzer::new(AnalyzerConfig::default()).unwrap();
//! let analysis = analyzer.analyze("df = df.dropna()\ndf.reset_index(inplace=True)");
//!
//! assert_eq!(analysis.category, Category::Transform);
//! assert!(analysis.used.contains("df"));
//! assert!(!analysis.pure_overwrites.contains("df"));
//! ```

mod ast_analyzer;
mod category;
mod config;
mod error;
mod literal;
mod spec_extract;
mod stub_eval;
mod types;

pub use ast_analyzer::FragmentAnalyzer;
pub use category::{CategorySignals, Categorizer};
pub use config::AnalyzerConfig;
pub use error::{AnalyzerError, Result};
pub use spec_extract::{
    LiteralSpecExtractor, ParsedFragment, SpecExtractorChain, StubChartExtractor,
    TrySpecExtractor,
};
pub use types::{Category, Fragment, FragmentAnalysis, NameSet};
