use std::{fs, path::PathBuf};

use image::{DynamicImage, ImageFormat};
use nalgebra::Vector3;
use tracing::info;

use reconstruct::{
    error::ReconstructError,
    volume::{Volume, VolumeSource},
    Pos, Result,
};

/// A directory of equally sized grayscale slices, stacked along z in file
/// name order.
pub struct ImageStackSource {
    pub directory: PathBuf,
    pub spacing: Pos,
}

/// A solid sphere in the middle of a cubic volume. Voxels hold the signed
/// distance to the surface, positive inside.
pub struct Phantom {
    pub size: usize,
    pub radius: f32,
    pub spacing: Pos,
}

impl VolumeSource for ImageStackSource {
    fn load(&self) -> Result<Volume> {
        let mut paths = fs::read_dir(&self.directory)?
            .filter_map(|entry| entry.ok().map(|x| x.path()))
            .filter(|path| path.is_file() && ImageFormat::from_path(path).is_ok())
            .collect::<Vec<_>>();
        paths.sort();

        if paths.is_empty() {
            return Err(invalid(format!(
                "no slice images found in {}",
                self.directory.display()
            )));
        }

        let mut size = None;
        let mut voxels = Vec::new();
        for path in paths.iter() {
            let image = image::open(path)
                .map_err(|err| invalid(format!("failed to read {}: {err}", path.display())))?;

            let dimensions = (image.width() as usize, image.height() as usize);
            match size {
                None => size = Some(dimensions),
                Some(expected) if expected != dimensions => {
                    return Err(invalid(format!(
                        "slice {} is {}x{}, expected {}x{}",
                        path.display(),
                        dimensions.0,
                        dimensions.1,
                        expected.0,
                        expected.1
                    )));
                }
                Some(_) => {}
            }

            voxels.extend(luma(&image));
        }

        let (width, height) = size.unwrap_or_default();
        info!(
            "Loaded {} slices of {}x{} from {}",
            paths.len(),
            width,
            height,
            self.directory.display()
        );
        Volume::new(Vector3::new(width, height, paths.len()), self.spacing, voxels)
    }
}

impl VolumeSource for Phantom {
    fn load(&self) -> Result<Volume> {
        let dimensions = Vector3::repeat(self.size);
        let center = dimensions.cast::<f32>().component_mul(&self.spacing) / 2.0;

        Volume::from_fn(dimensions, self.spacing, |i, j, k| {
            let point = Pos::new(i as f32, j as f32, k as f32).component_mul(&self.spacing);
            self.radius - (point - center).magnitude()
        })
    }
}

/// Raw luma values, keeping the full range of 16 bit images.
fn luma(image: &DynamicImage) -> Vec<f32> {
    match image {
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => image.to_luma16().iter().map(|&x| x as f32).collect(),
        _ => image.to_luma8().iter().map(|&x| x as f32).collect(),
    }
}

fn invalid(reason: String) -> ReconstructError {
    ReconstructError::InvalidVolume { reason }
}

#[cfg(test)]
mod tests {
    use std::{env, fs, process};

    use image::{GrayImage, Luma};
    use nalgebra::Vector3;
    use reconstruct::{error::ReconstructError, volume::VolumeSource, Pos};

    use super::{ImageStackSource, Phantom};

    #[test]
    fn phantom_is_positive_inside() {
        let phantom = Phantom {
            size: 16,
            radius: 5.0,
            spacing: Pos::repeat(1.0),
        };
        let volume = phantom.load().unwrap();

        assert_eq!(volume.dimensions(), Vector3::repeat(16));
        assert_eq!(volume.get(8, 8, 8), 5.0);
        assert!(volume.get(0, 0, 0) < 0.0);
    }

    #[test]
    fn stacks_images_in_name_order() {
        let directory = env::temp_dir().join(format!("reconstruct-slices-{}", process::id()));
        fs::create_dir_all(&directory).unwrap();

        for (name, value) in [("b.png", 20), ("a.png", 10), ("c.png", 30)] {
            GrayImage::from_fn(4, 3, |_, _| Luma([value]))
                .save(directory.join(name))
                .unwrap();
        }
        fs::write(directory.join("notes.txt"), "not a slice").unwrap();

        let source = ImageStackSource {
            directory: directory.clone(),
            spacing: Pos::new(0.5, 0.5, 2.0),
        };
        let volume = source.load();
        fs::remove_dir_all(&directory).unwrap();

        let volume = volume.unwrap();
        assert_eq!(volume.dimensions(), Vector3::new(4, 3, 3));
        assert_eq!(volume.spacing(), Pos::new(0.5, 0.5, 2.0));
        assert_eq!(volume.get(0, 0, 0), 10.0);
        assert_eq!(volume.get(3, 2, 2), 30.0);
    }

    #[test]
    fn empty_directory_is_invalid() {
        let directory = env::temp_dir().join(format!("reconstruct-empty-{}", process::id()));
        fs::create_dir_all(&directory).unwrap();

        let source = ImageStackSource {
            directory: directory.clone(),
            spacing: Pos::repeat(1.0),
        };
        let result = source.load();
        fs::remove_dir_all(&directory).unwrap();

        assert!(matches!(result, Err(ReconstructError::InvalidVolume { .. })));
    }
}
