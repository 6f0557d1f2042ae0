//! Persian (Jalali) to Gregorian civil date conversion.
//!
//! The schedule page publishes kickoff dates in the Jalali calendar
//! (`YYYY/MM/DD`). This module converts them to `chrono::NaiveDate` using the
//! 33-year-cycle arithmetic of the jalaali calendar; out-of-range input maps
//! to `None`, never to a guessed date.

use chrono::NaiveDate;

/// Jalali years covered by the cycle break table below.
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 3176;

/// Years in which the 33-year leap cycle was (or will be) re-anchored.
const BREAKS: [i32; 20] = [
    -61, 9, 38, 199, 426, 686, 756, 818, 1111, 1181, 1210, 1635, 2060, 2097, 2192, 2262, 2324,
    2394, 2456, 3178,
];

/// Days from 0001-01-01 CE (proleptic Gregorian) to JDN 0.
const JDN_TO_DAYS_CE: i64 = 1_721_425;

/// Convert a Jalali civil date to the equivalent Gregorian date.
///
/// Returns `None` when the year is outside the supported range or the
/// month/day do not form a real Jalali date (e.g. Esfand 30 in a common year).
pub fn jalali_to_gregorian(jy: i32, jm: u32, jd: u32) -> Option<NaiveDate> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&jy) || !(1..=12).contains(&jm) {
        return None;
    }
    if jd < 1 || jd > month_length(jy, jm) {
        return None;
    }

    let (_, gy, march) = jal_cal(jy);
    let jm = jm as i64;
    let jd = jd as i64;

    // Julian day number of the requested date: Farvardin 1 anchor plus the
    // 31/30-day month offsets of the Jalali year.
    let jdn = g2d(gy, 3, march) + (jm - 1) * 31 - (jm / 7) * (jm - 7) + jd - 1;

    NaiveDate::from_num_days_from_ce_opt((jdn - JDN_TO_DAYS_CE) as i32)
}

/// Number of days in the given Jalali month.
pub fn month_length(jy: i32, jm: u32) -> u32 {
    match jm {
        1..=6 => 31,
        7..=11 => 30,
        12 if is_leap_year(jy) => 30,
        12 => 29,
        _ => 0,
    }
}

/// Whether the Jalali year has 366 days.
pub fn is_leap_year(jy: i32) -> bool {
    jal_cal(jy).0 == 0
}

/// Leap status of `jy`, the matching Gregorian year, and the March day on
/// which Farvardin 1 of `jy` falls.
fn jal_cal(jy: i32) -> (i32, i64, i64) {
    let gy = jy + 621;
    let mut leap_j: i32 = -14;
    let mut jp = BREAKS[0];
    let mut jump = 0;

    for &jb in &BREAKS[1..] {
        jump = jb - jp;
        if jy < jb {
            break;
        }
        leap_j += (jump / 33) * 8 + (jump % 33) / 4;
        jp = jb;
    }

    let mut n = jy - jp;
    leap_j += (n / 33) * 8 + ((n % 33) + 3) / 4;
    if jump % 33 == 4 && jump - n == 4 {
        leap_j += 1;
    }

    let leap_g = gy / 4 - ((gy / 100 + 1) * 3) / 4 - 150;
    let march = 20 + leap_j - leap_g;

    if jump - n < 6 {
        n = n - jump + ((jump + 4) / 33) * 33;
    }
    let mut leap = (((n + 1) % 33) - 1) % 4;
    if leap == -1 {
        leap = 4;
    }

    (leap, gy as i64, march as i64)
}

/// Julian day number of a proleptic Gregorian date (truncating division, all
/// terms positive for the years we handle).
fn g2d(gy: i64, gm: i64, gd: i64) -> i64 {
    let d = ((gy + (gm - 8) / 6 + 100_100) * 1461) / 4 + (153 * ((gm + 9) % 12) + 2) / 5 + gd
        - 34_840_408;
    d - (((gy + 100_100 + (gm - 8) / 6) / 100) * 3) / 4 + 752
}
