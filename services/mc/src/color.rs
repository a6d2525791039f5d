use misty_types::LedColor;

/// Parses an LED color given as `r,g,b` or as a color name.
///
/// Names are case-insensitive. Anything unrecognised, including components
/// outside `0..=255`, is `None`.
pub fn parse_color(input: &str) -> Option<LedColor> {
    if input.contains(',') {
        let parts = input
            .split(',')
            .map(|part| part.trim().parse::<u8>().ok())
            .collect::<Option<Vec<_>>>()?;
        return match parts.as_slice() {
            [red, green, blue] => Some(LedColor::new(*red, *green, *blue)),
            _ => None,
        };
    }

    let color = match input.to_lowercase().as_str() {
        "red" => LedColor::new(255, 0, 0),
        "green" => LedColor::new(0, 255, 0),
        "blue" => LedColor::new(0, 0, 255),
        "magenta" => LedColor::new(255, 0, 255),
        "cyan" => LedColor::new(0, 255, 255),
        "yellow" => LedColor::new(255, 255, 0),
        "orange" => LedColor::new(255, 128, 0),
        "purple" => LedColor::new(128, 0, 255),
        "off" => LedColor::new(0, 0, 0),
        _ => return None,
    };
    Some(color)
}
