/// Revenue split computation
///
/// The platform share is rounded half-up in integer cents; the creator
/// share is the remainder, so the two always sum back to the amount.
pub fn compute_split(amount_cents: i64, platform_fee_percent: i64) -> (i64, i64) {
    let platform_share = (amount_cents * platform_fee_percent + 50) / 100;
    let creator_share = amount_cents - platform_share;
    (creator_share, platform_share)
}
