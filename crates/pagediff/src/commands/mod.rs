mod compare;
mod serve;

pub use self::compare::compare;
pub use self::serve::serve;
