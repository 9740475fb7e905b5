//! # Navigator Resolver
//!
//! Locates paths and definitions in remote repositories whose trees are only
//! visible one listing at a time.
//!
//! ## Features
//!
//! - **Fallback exploration** - walk up from a missing path to the deepest existing ancestor
//! - **Auto-navigation** - re-descend into the closest-named directories
//! - **Similarity suggestions** - ranked sibling names plus next-step hints
//! - **Chain tracing** - follow a class across repositories through its imports
//!
//! ## Architecture
//!
//! ```text
//! RepositorySource (GitHub, fixture)
//!     │
//!     ├──> PathExistenceProbe
//!     │      └─ NotFound is a value, everything else aborts
//!     │
//!     ├──> FallbackPathExplorer
//!     │      ├─ Bounded parent walk (visited set, history)
//!     │      ├─ Auto-navigation via SimilarityRanker
//!     │      └─ SuggestionComposer
//!     │
//!     ├──> ChainTracer
//!     │      ├─ Definition search (profile query templates)
//!     │      ├─ First mapped import -> next repository
//!     │      └─ Depth bound + (repo, entity) cycle guard
//!     │
//!     └──> StructureWalker / FileFinder / MethodTracer
//! ```

mod cancel;
mod error;
mod explorer;
mod finder;
mod imports;
mod mapping;
mod memory;
mod method;
mod navigator;
pub mod path;
mod probe;
mod profile;
mod similarity;
mod source;
mod structure;
mod suggest;
mod tracer;
mod types;

pub use cancel::{CancelHandle, CancelSignal};
pub use error::{ResolveError, Result, SourceError, SourceResult};
pub use explorer::{
    ExplorationOutcome, ExplorationResult, ExplorationState, FallbackPathExplorer, NavigationStep,
    Transition,
};
pub use finder::{fuzzy_rank, FileFinder, FileMatch, FileMatches};
pub use imports::{parse_imports, ImportDecl};
pub use mapping::{Dependency, DependencyList, MappedDependency, PackageMapping};
pub use memory::{InMemorySource, SourceCall, SourceOp};
pub use method::{MethodImplementation, MethodSignature, MethodTrace, MethodTracer, MethodUsage};
pub use navigator::Navigator;
pub use path::PathFilters;
pub use probe::{ExistenceReport, PathExistenceProbe, ProbeOutcome};
pub use profile::{ResolverLimits, ResolverProfile};
pub use similarity::{
    MatchKind, ScoredCandidate, Similarity, SimilarityRanker, CONTAINMENT_SCORE,
    DEFAULT_MAX_SUGGESTIONS, DEFAULT_RATIO_THRESHOLD, EXACT_SCORE, EXTENSION_VARIANT_SCORE,
};
pub use source::RepositorySource;
pub use structure::{RepoStructure, StructureNode, StructureWalker};
pub use suggest::{OutcomeKind, SuggestedPath, SuggestionComposer, Suggestions};
pub use tracer::{ChainNode, ChainResult, ChainStop, ChainTracer};
pub use types::{EntryKind, FileContent, Listing, RepositoryRef, SearchHit, SearchScope, TreeEntry};
