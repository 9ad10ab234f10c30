use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bob_core::models::NewProfile;
use bob_core::service::BobService;

use super::helpers::truncate;

pub(crate) fn cmd_user_add(
    svc: &BobService,
    name: &str,
    goal: &str,
    calories: i64,
    json: bool,
) -> Result<()> {
    let profile = svc.create_profile(&NewProfile {
        name: name.to_string(),
        goal: goal.to_string(),
        daily_calorie_target: calories,
    })?;

    // First profile becomes the default automatically
    if svc.default_user()?.is_none() {
        svc.set_default_user(&profile.name)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!(
            "Created profile '{}' (goal: {}, target: {} kcal/day)",
            profile.name, profile.goal, profile.daily_calorie_target
        );
    }

    Ok(())
}

pub(crate) fn cmd_user_list(svc: &BobService, json: bool) -> Result<()> {
    let profiles = svc.list_profiles()?;
    let default = svc.default_user()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
    } else if profiles.is_empty() {
        eprintln!("No profiles yet. Use `bob user add` to create one.");
    } else {
        #[derive(Tabled)]
        struct ProfileRow {
            #[tabled(rename = " ")]
            marker: String,
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "Goal")]
            goal: String,
            #[tabled(rename = "Target (kcal)")]
            target: i64,
        }

        let rows: Vec<ProfileRow> = profiles
            .iter()
            .map(|p| ProfileRow {
                marker: if default.as_deref() == Some(p.name.as_str()) {
                    "*".to_string()
                } else {
                    String::new()
                },
                name: truncate(&p.name, 30),
                goal: p.goal.clone(),
                target: p.daily_calorie_target,
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) fn cmd_user_delete(svc: &BobService, name: &str, json: bool) -> Result<()> {
    svc.delete_profile(name)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": name }));
    } else {
        println!("Deleted profile '{name}' and all its logs");
    }

    Ok(())
}

pub(crate) fn cmd_user_switch(svc: &BobService, name: &str, json: bool) -> Result<()> {
    svc.set_default_user(name)?;

    if json {
        println!("{}", serde_json::json!({ "default_user": name }));
    } else {
        println!("Default user is now '{name}'");
    }

    Ok(())
}
