/// Rounds half away from zero to the given number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Win percentage with one decimal, 0 when no game was played.
pub fn win_rate(wins: u32, games: u32) -> f64 {
    match games {
        0 => 0.0,
        games => round_to(wins as f64 / games as f64 * 100.0, 1),
    }
}

/// (kills + assists) / deaths with two decimals. A deathless record counts
/// kills + assists as is instead of dividing by zero.
pub fn kda(kills: u32, deaths: u32, assists: u32) -> f64 {
    let takedowns = (kills + assists) as f64;
    match deaths {
        0 => round_to(takedowns, 2),
        deaths => round_to(takedowns / deaths as f64, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kda_without_deaths_is_takedowns() {
        assert_eq!(kda(8, 0, 5), 13.0);
    }

    #[test]
    fn kda_with_deaths() {
        assert_eq!(kda(8, 2, 5), 6.5);
        assert_eq!(kda(1, 3, 1), 0.67);
    }

    #[test]
    fn win_rate_rounds_to_one_decimal() {
        assert_eq!(win_rate(0, 0), 0.0);
        assert_eq!(win_rate(2, 3), 66.7);
        assert_eq!(win_rate(51, 100), 51.0);
    }
}
