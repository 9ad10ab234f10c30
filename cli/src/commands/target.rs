use anyhow::Result;

use bob_core::service::BobService;

pub(crate) fn cmd_target_set(svc: &BobService, user: &str, calories: i64, json: bool) -> Result<()> {
    let profile = svc.set_target(user, calories)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!(
            "Target for '{}' is now {} kcal/day",
            profile.name, profile.daily_calorie_target
        );
        println!("Note: manual edits are not recorded in calibration history.");
    }

    Ok(())
}

pub(crate) fn cmd_target_show(svc: &BobService, user: &str, json: bool) -> Result<()> {
    let profile = svc.get_profile(user)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "user": profile.name,
                "goal": profile.goal,
                "daily_calorie_target": profile.daily_calorie_target,
            })
        );
    } else {
        println!(
            "{}: {} kcal/day (goal: {})",
            profile.name, profile.daily_calorie_target, profile.goal
        );
    }

    Ok(())
}
