//! Track engine: moving users along promotion ladders

pub mod engine;

pub use engine::{
    apply_demotion, apply_promotion, demote, plan_demotion, plan_promotion, promote, Demotion,
    Promotion,
};
