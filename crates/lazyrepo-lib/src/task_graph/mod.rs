mod visitor;

pub use visitor::Visitor;
