pub mod cube_io;
pub mod fit;
pub mod synth;
