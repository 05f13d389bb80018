use anyhow::{Context, Result};

use sugarlog_core::service::SugarService;

pub(crate) fn cmd_user_add(
    svc: &SugarService,
    email: &str,
    name: Option<String>,
    json: bool,
) -> Result<()> {
    let user = svc.register_user(email, name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        let id = user.id;
        let email = &user.email;
        match &user.full_name {
            Some(name) => println!("Registered user {id}: {name} <{email}>"),
            None => println!("Registered user {id}: {email}"),
        }
    }
    Ok(())
}

pub(crate) fn cmd_user_show(svc: &SugarService, id: i64, json: bool) -> Result<()> {
    let user = svc
        .get_user(id)?
        .with_context(|| format!("User {id} not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        println!("User {}", user.id);
        println!("  Email:   {}", user.email);
        if let Some(name) = &user.full_name {
            println!("  Name:    {name}");
        }
        println!("  Created: {}", user.created_at);
    }
    Ok(())
}
