pub mod image_record;
pub mod job;
pub mod style;

pub use image_record::{ImageData, ImageRecord, OutputFormat, RecordStatus};
pub use job::Job;
pub use style::{parse_angles, Angle, Background, Lighting, Material, StyleOptions};
