//! The recipe catalog (expansion, SPEC_FULL §3/§4.8): a read-only,
//! in-memory-cached view over either a local directory of recipe
//! documents or a remote manifest, implementing `cl_tools::RecipeProvider`
//! for the tool layer and backing the `GET /v1/recipes*` REST surface.

mod registry;

pub use registry::RecipeRegistry;
