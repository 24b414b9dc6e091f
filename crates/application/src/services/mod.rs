pub mod arbiter;
pub mod classifier;
pub mod suffix_trie;

pub use arbiter::{AnswerArbiter, CandidateAnswer, Verdict};
pub use classifier::{Classification, DomainClassifier, GroupList};
