//! Step definitions
//!
//! Every handler is a plain `async fn(&mut AcceptanceWorld, StepArgs)`;
//! `step!` boxes it into the [`StepFn`](crate::scenarios::StepFn) shape the registry stores.

use crate::{scenarios::StepRegistry, world::AcceptanceWorld};

macro_rules! step {
    ($handler:path) => {{
        fn boxed(
            world: &mut $crate::world::AcceptanceWorld,
            args: $crate::scenarios::StepArgs,
        ) -> $crate::scenarios::StepFuture<'_> {
            Box::pin($handler(world, args))
        }
        boxed as $crate::scenarios::StepFn<$crate::world::AcceptanceWorld>
    }};
}

pub(crate) use step;

mod consensus;
mod token;

/// Registry holding the consensus topic and token service steps
pub fn registry() -> Result<StepRegistry<AcceptanceWorld>, regex::Error> {
    let mut registry = StepRegistry::new();
    consensus::register(&mut registry)?;
    token::register(&mut registry)?;
    Ok(registry)
}
