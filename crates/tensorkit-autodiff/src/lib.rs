pub mod backward;
pub mod graph;
pub mod variable;

pub use backward::backward;
pub use graph::{reset_graph, with_graph, Graph, NodeId, Op};
pub use variable::Variable;
