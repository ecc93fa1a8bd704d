//! Annotation types and format I/O for facelabel.
//!
//! Data flows one way: [`io_wider`] turns a WIDER FACE ground-truth file
//! into [`ImageRecord`]s, [`RawBox::normalize`] converts each face into a
//! [`NormalizedBox`], and [`io_yolo`] writes label files and the manifest.
//!
//! # Example
//!
//! ```
//! use facelabel::ir::io_wider::{ParseEvent, ParserOptions, RecordParser};
//!
//! let lines = ["a.jpg", "1", "10 10 20 20 0 0 0 0 0 0"];
//! let mut parser = RecordParser::new(lines.iter(), ParserOptions::default());
//!
//! let Some(ParseEvent::Record(record)) = parser.next() else {
//!     panic!("expected a record");
//! };
//! let label = record.boxes[0].normalize(100, 100).unwrap();
//! assert_eq!(label.to_string(), "0 0.200000 0.200000 0.200000 0.200000");
//! ```

mod bbox;
pub mod encoding;
pub mod io_wider;
pub mod io_yolo;
mod model;
mod space;

pub use bbox::{BBoxCXCYWH, BBoxXYWH};
pub use model::{
    BoxRejection, FaceAttributes, ImageRecord, NormalizedBox, RawBox, Split, FACE_CLASS_ID,
    FACE_CLASS_NAME,
};
pub use space::{Normalized, Pixel};
