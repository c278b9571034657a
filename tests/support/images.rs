use std::path::Path;

/// Write a class-per-folder tree with `count` placeholder images per class.
pub fn write_image_tree(root: &Path, classes: &[(&str, usize)]) {
    for &(class, count) in classes {
        let dir = root.join(class);
        std::fs::create_dir_all(&dir).expect("create class dir");
        for idx in 0..count {
            std::fs::write(dir.join(format!("{idx:03}.jpg")), b"\xff\xd8\xff").expect("write image");
        }
    }
}
