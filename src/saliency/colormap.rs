/// JET palette: dark blue at 0, through cyan, yellow, to dark red at 1.
/// Input is clamped to [0, 1].
pub fn jet(value: f32) -> [u8; 3] {
    let x = value.clamp(0.0, 1.0);
    let channel = |offset: f32| ((1.5 - (4.0 * x - offset).abs()).clamp(0.0, 1.0) * 255.0).round() as u8;
    [channel(3.0), channel(2.0), channel(1.0)]
}

/// Quantizes to 256 levels first, like an 8-bit lookup table would.
pub fn jet_u8(level: u8) -> [u8; 3] {
    jet(level as f32 / 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_and_middle() {
        assert_eq!(jet(0.0), [0, 0, 128]);
        assert_eq!(jet(1.0), [128, 0, 0]);
        let mid = jet(0.5);
        assert_eq!(mid[1], 255);
        assert_eq!(mid[0], mid[2]);
    }

    #[test]
    fn out_of_range_is_clamped() {
        assert_eq!(jet(-3.0), jet(0.0));
        assert_eq!(jet(7.0), jet(1.0));
    }
}
