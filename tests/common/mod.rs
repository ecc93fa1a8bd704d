#![allow(dead_code)]

use std::fs;
use std::path::Path;

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// Lays out a miniature WIDER FACE download under `root`.
///
/// `train_gt` and `val_gt` are written verbatim as the ground-truth files;
/// `images` lists `(split, relative path, width, height)` to create.
pub fn write_wider_root(
    root: &Path,
    train_gt: &[u8],
    val_gt: &[u8],
    images: &[(&str, &str, u32, u32)],
) {
    let split_dir = root.join("wider_face_split");
    fs::create_dir_all(&split_dir).expect("create wider_face_split");
    fs::write(split_dir.join("wider_face_train_bbx_gt.txt"), train_gt).expect("write train gt");
    fs::write(split_dir.join("wider_face_val_bbx_gt.txt"), val_gt).expect("write val gt");

    for split in ["train", "val"] {
        fs::create_dir_all(root.join(format!("WIDER_{split}/images"))).expect("create image root");
    }

    for (split, rel, width, height) in images {
        write_bmp(
            &root.join(format!("WIDER_{split}/images")).join(rel),
            *width,
            *height,
        );
    }
}

/// A small corpus exercising the common paths: two events, an invalid
/// face, an out-of-range face and an image with no surviving boxes.
pub const TRAIN_GT: &str = "\
0--Parade/0_Parade_1.bmp
2
10 10 20 20 0 0 0 0 0 0
5 5 9999 9999 0 0 0 1 0 0
1--Handshaking/1_Handshaking_2.bmp
3
0 0 32 16 1 0 0 0 0 0
60 30 10 10 0 0 0 0 0 0
8 4 8 8 2 0 0 0 1 0
";

pub const VAL_GT: &str = "\
2--Demonstration/2_Demonstration_3.bmp
1
1 1 2 2 0 0 0 1 0 0
";

pub const IMAGES: [(&str, &str, u32, u32); 3] = [
    ("train", "0--Parade/0_Parade_1.bmp", 100, 100),
    ("train", "1--Handshaking/1_Handshaking_2.bmp", 64, 32),
    ("val", "2--Demonstration/2_Demonstration_3.bmp", 16, 16),
];
