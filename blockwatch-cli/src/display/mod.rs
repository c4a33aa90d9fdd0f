pub mod palette;
pub mod spinner;

pub use palette::Palette;
pub use spinner::Spinner;
