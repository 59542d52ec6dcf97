//! Plain-text diagnostics table of the remote avatars

use crate::world::RemoteAvatars;
use std::fmt::Write;

/// Formats a coordinate as sign, two-digit whole part and two decimals
///
/// `1.5` becomes `+01.50` and `-2.25` becomes `-02.25`. Whole parts wider than
/// two digits are printed in full.
pub fn format_number(value: f32) -> String {
    let sign = if value < 0.0 { '-' } else { '+' };
    let hundredths = (value.abs() as f64 * 100.0).round() as u64;
    format!("{}{:02}.{:02}", sign, hundredths / 100, hundredths % 100)
}

/// Renders one row per remote avatar under a header line
pub fn format_table(world: &RemoteAvatars) -> String {
    let mut table = String::new();
    let _ = writeln!(
        table,
        "{:>5} | {:<32} | {:<34} | {}",
        "ID", "Location", "Rotation", "State"
    );

    for update in world.iter() {
        let location = format!(
            "x: {}, y: {}, z: {}",
            format_number(update.location.x),
            format_number(update.location.y),
            format_number(update.location.z)
        );
        let rotation = format!(
            "x: 0, y: {}, z: 0, w: {}",
            format_number(update.rotation.quaternion_y),
            format_number(update.rotation.quaternion_w)
        );
        let _ = writeln!(
            table,
            "{:>5} | {:<32} | {:<34} | {}",
            update.id,
            location,
            rotation,
            update.state.as_str()
        );
    }

    table
}
