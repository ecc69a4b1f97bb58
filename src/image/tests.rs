use super::*;
use Color as C;

fn mkimage<const W: usize, const H: usize>(data: [[Color; W]; H]) -> Image {
    let mut image = Image::new(W as u32, H as u32);
    for (y, row) in data.iter().enumerate() {
        for (x, color) in row.iter().enumerate() {
            image.set(x as u32, y as u32, *color);
        }
    }
    image
}

#[test]
fn view_inside() {
    let image = mkimage([[C::RED, C::GREEN], [C::BLUE, C::WHITE]]);

    let view = image.view(Rect::from_top_left(1, 1, 1, 1));
    assert_eq!(view.resolution(), Resolution::new(1, 1));
    assert_eq!(view.get(0, 0), C::WHITE);

    let sub = image.view(Rect::from_top_left(0, 1, 2, 1)).view(Rect::from_top_left(1, 0, 1, 1));
    assert_eq!(sub.get(0, 0), C::WHITE);
}

#[test]
fn view_out_of_bounds() {
    let image = mkimage([[C::RED, C::GREEN]]);

    // Views keep their size even when they extend past the image.
    let view = image.view(Rect::from_top_left(-1, 0, 4, 2));
    assert_eq!(view.width(), 4);
    assert_eq!(view.height(), 2);
    assert_eq!(view.get(0, 0), C::NULL);
    assert_eq!(view.get(1, 0), C::RED);
    assert_eq!(view.get(2, 0), C::GREEN);
    assert_eq!(view.get(3, 0), C::NULL);
    assert_eq!(view.get(1, 1), C::NULL);
}

#[test]
fn view_mut_ignores_outside_writes() {
    let mut image = mkimage([[C::RED, C::GREEN]]);
    let mut view = image.view_mut(Rect::from_top_left(1, -1, 2, 2));
    view.set(0, 1, C::BLUE);
    view.set(1, 1, C::BLUE);
    view.set(0, 0, C::BLUE);
    assert_eq!(image.get(0, 0), C::RED);
    assert_eq!(image.get(1, 0), C::BLUE);
}

#[test]
fn mirror() {
    let mut image = mkimage([[C::RED, C::GREEN, C::BLUE]]);
    image.flip_horizontal_in_place();
    assert_eq!(image.get(0, 0), C::BLUE);
    assert_eq!(image.get(1, 0), C::GREEN);
    assert_eq!(image.get(2, 0), C::RED);
}

#[test]
fn raw_data() {
    let image = mkimage([[C::RED, C::BLACK]]);
    assert_eq!(image.data(), &[255, 0, 0, 255, 0, 0, 0, 255]);
}
