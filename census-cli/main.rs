use census_cli::{detect_features, Config, StereoPipeline};
use census_core::{Image, Pt};
use census_transform::SamplingWindow;
use image::{GrayImage, ImageReader, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use std::time::Instant;

fn load_gray(path: &str) -> GrayImage {
    ImageReader::open(path)
        .expect("Image not found")
        .decode()
        .expect("Decode failed")
        .to_luma8()
}

/// Copy a decoded grayscale image into an aligned-stride buffer.
fn to_aligned(img: &GrayImage) -> Image<'static> {
    let (w, h) = img.dimensions();
    let mut im = Image::alloc(h as i32, w as i32, 1, Pt::default()).expect("Bad image dimensions");
    let stride = im.stride as usize;
    let data = im.data_mut().expect("Owned buffer");
    for (y, row) in img.rows().enumerate() {
        for (x, px) in row.enumerate() {
            data[y * stride + x] = px.0[0];
        }
    }
    im
}

fn main() {
    let mut args = std::env::args().skip(1);
    let left_path = args.next().unwrap_or_else(|| "left.png".to_string());
    let right_path = args.next().unwrap_or_else(|| "right.png".to_string());

    let left_img = load_gray(&left_path);
    let right_img = load_gray(&right_path);
    assert_eq!(
        left_img.dimensions(),
        right_img.dimensions(),
        "Stereo pair dimensions differ"
    );
    let (w, h) = left_img.dimensions();

    census_core::init_thread_pool(census_core::default_thread_count())
        .expect("Thread pool init failed");

    let left = to_aligned(&left_img);
    let right = to_aligned(&right_img);

    let config = Config::stereo_preset(h as i32, w as i32);
    let mut pipeline = StereoPipeline::new(SamplingWindow::Sparse16, &config, left.stride)
        .expect("Pipeline setup failed");

    // Time the full pipeline
    let t0 = Instant::now();
    let kps_left = detect_features(&left, 120).expect("Detection failed");
    let kps_right = detect_features(&right, 120).expect("Detection failed");
    let detect_elapsed = t0.elapsed();

    let t1 = Instant::now();
    let matches = pipeline
        .process(&left, &right, &kps_left, &kps_right)
        .expect("Matching failed");
    let match_elapsed = t1.elapsed();

    println!("Detection time: {:.2?}", detect_elapsed);
    println!("Transform + match time: {:.2?}", match_elapsed);
    println!(
        "Detected {} / {} features",
        kps_left.len(),
        kps_right.len()
    );
    println!("Matched {} correspondences", matches.len());

    // Side-by-side canvas, left view then right view
    let mut output = RgbaImage::new(w * 2, h);
    let left_rgba: RgbaImage = image::DynamicImage::ImageLuma8(left_img).into_rgba8();
    let right_rgba: RgbaImage = image::DynamicImage::ImageLuma8(right_img).into_rgba8();
    image::imageops::replace(&mut output, &left_rgba, 0, 0);
    image::imageops::replace(&mut output, &right_rgba, w as i64, 0);

    for m in &matches {
        let f1 = &kps_left.all_features[m.feature1_idx];
        let f2 = &kps_right.all_features[m.feature2_idx];
        let p1 = (f1.x, f1.y);
        let p2 = (f2.x + w as i32, f2.y);
        draw_hollow_circle_mut(&mut output, p1, 3, Rgba([255, 0, 0, 255]));
        draw_hollow_circle_mut(&mut output, p2, 3, Rgba([255, 0, 0, 255]));
        draw_line_segment_mut(
            &mut output,
            (p1.0 as f32, p1.1 as f32),
            (p2.0 as f32, p2.1 as f32),
            Rgba([0, 255, 0, 255]),
        );
    }

    output
        .save("matches.png")
        .expect("Failed to save output image");
    println!("Saved result image as matches.png");
}
