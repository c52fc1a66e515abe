pub mod diffusion;
pub mod normalize;
pub mod propagation;
pub mod triangle;
