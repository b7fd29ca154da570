//! # seqforge
//!
//! A feedback-directed, component-based test-sequence generation engine.
//!
//! The engine grows a pool of executable statement sequences: each step it
//! selects an operation, wires its inputs from values produced by sequences
//! already in the pool, executes the extended sequence through an external
//! boundary, and feeds the outcome back into the pool and the selection
//! strategies. Execution, classification, and coverage measurement are
//! supplied by the embedder as trait objects; the engine owns only the
//! generation logic.

pub mod executor;
pub mod fuzz;
pub mod generator;
pub mod helpers;
pub mod input_selectors;
pub mod op_selectors;
pub mod operation;
pub mod pool;
pub mod randomness;
pub mod sequence;
pub mod types;
pub mod value;

// Re-export the surface an embedder needs for a typical run.
pub use executor::{
    Classification, CoverageOracle, ExecutedSequence, ExecutionOutcome, GenerationListener,
    ListenerManager, OutcomeClassifier, SequenceClassifier, SequenceExecutor, Stopper,
};
pub use fuzz::Fuzzer;
pub use generator::{
    ForwardGenerator, GenerationConfig, GenerationError, GenerationStats, InputStrategy,
    OperationStrategy,
};
pub use input_selectors::{
    ConstantMiningSelection, InputSequenceSelector, OrienteeringSelection,
    SmallTestsInputSelector, UniformInputSelector,
};
pub use op_selectors::{Bloodhound, OperationSelector, UniformOperationSelector};
pub use operation::{BuiltinOp, Operation, OperationKind, StringEditKind};
pub use pool::{CandidateList, ComponentManager, LiteralStatistics, SequenceCollection};
pub use sequence::{Sequence, Statement};
pub use types::{NumericKind, SubTypeSet, TypeId, TypeKind, TypeUniverse};
pub use value::RuntimeValue;
