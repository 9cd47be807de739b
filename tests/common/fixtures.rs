use cardscan::{Catalog, FingerprintEngine, ReferenceCard};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

/// Reference card art size (portrait, card aspect ratio)
pub const ART_WIDTH: u32 = 440;
pub const ART_HEIGHT: u32 = 616;

/// Deterministic pseudo-random numbers in [0, 1)
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 40) as f32 / (1u64 << 24) as f32
    }
}

/// Synthetic card: thin light border around a smooth pattern unique to `seed`.
/// All pixels stay above the default binarization level so the whole
/// card forms one foreground region.
pub fn card_art(seed: u64) -> RgbImage {
    let mut rng = Lcg(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ 0x5151);
    let waves: Vec<(f32, f32, f32)> = (0..5)
        .map(|_| {
            (
                0.5 + rng.next() * 3.0,
                0.5 + rng.next() * 3.0,
                rng.next() * std::f32::consts::TAU,
            )
        })
        .collect();

    let border = ART_WIDTH / 50;
    RgbImage::from_fn(ART_WIDTH, ART_HEIGHT, |x, y| {
        if x < border || y < border || x >= ART_WIDTH - border || y >= ART_HEIGHT - border {
            return Rgb([225, 225, 225]);
        }
        let u = x as f32 / ART_WIDTH as f32;
        let v = y as f32 / ART_HEIGHT as f32;
        let value: f32 = 195.0
            + waves
                .iter()
                .map(|&(fx, fy, phase)| {
                    10.0 * (std::f32::consts::TAU * (fx * u + fy * v) + phase).sin()
                })
                .sum::<f32>();
        let v = value.round().clamp(140.0, 250.0) as u8;
        Rgb([v, v, v])
    })
}

/// Reference set "set-0", "set-1", ...
pub fn reference_cards(count: u64) -> Vec<ReferenceCard> {
    (0..count)
        .map(|i| ReferenceCard {
            card_id: format!("set-{}", i),
            image: DynamicImage::ImageRgb8(card_art(i)),
        })
        .collect()
}

pub fn reference_catalog(count: u64) -> Catalog {
    Catalog::build(&reference_cards(count), &FingerprintEngine::default(), false)
        .expect("Failed to build reference catalog")
}

/// Dark frame of the given size
pub fn empty_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([15, 15, 15]))
}

/// Project `card` into `frame` so its corners land on
/// `[top_left, top_right, bottom_right, bottom_left]`
pub fn place_card(frame: &mut RgbImage, card: &RgbImage, corners: [(f32, f32); 4]) {
    let (w, h) = (card.width() as f32, card.height() as f32);
    let projection = Projection::from_control_points([(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)], corners)
        .expect("Card corners must form a valid quadrilateral");

    let mut layer = RgbImage::new(frame.width(), frame.height());
    warp_into(card, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut layer);

    // the card itself never contains pure black, so black marks "outside"
    for (x, y, p) in layer.enumerate_pixels() {
        if p.0 != [0, 0, 0] {
            frame.put_pixel(x, y, *p);
        }
    }
}

/// Axis-aligned rectangle corners for `place_card`
pub fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> [(f32, f32); 4] {
    [(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
}
