pub mod enrichment;
pub mod ixc;
pub mod normalize;
pub mod titulos;
