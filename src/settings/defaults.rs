//! Built-in groups and settings registered at startup.

use super::error::Result;
use super::{GroupOptions, SettingOptions, SettingsRegistry};

/// Upper bound for `count` in paginated queries.
pub const API_UPPER_COUNT_LIMIT: &str = "API_Upper_Count_Limit";
/// Page size used when a caller doesn't ask for one.
pub const API_DEFAULT_COUNT: &str = "API_Default_Count";
pub const MAX_ROOM_MEMBERS: &str = "Max_Room_Members";
pub const LIVECHAT_ENABLED: &str = "Livechat_enabled";
pub const LIVECHAT_ROUTING_METHOD: &str = "Livechat_Routing_Method";

/// Register every built-in group and setting.
///
/// Safe to run on every boot: values customized in an earlier run are kept.
pub async fn register(registry: &SettingsRegistry) -> Result<()> {
    let general = registry
        .group("General", GroupOptions::new().label("General").sorter(0))
        .await?;
    general
        .add("Site_Name", "Livedesk", SettingOptions::new().public())
        .await?;
    general
        .add("Site_Url", "http://localhost:3000", SettingOptions::new().public())
        .await?;
    general
        .add("Language", "en", SettingOptions::new().public())
        .await?;
    general
        .add(
            MAX_ROOM_MEMBERS,
            100,
            SettingOptions::new()
                .min(1.0)
                .description("Maximum number of members in a room"),
        )
        .await?;

    let api = general.section("REST API");
    api.add(
        API_UPPER_COUNT_LIMIT,
        100,
        SettingOptions::new()
            .min(1.0)
            .description("Largest page size a client may request"),
    )
    .await?;
    api.add(API_DEFAULT_COUNT, 50, SettingOptions::new().min(1.0)).await?;

    let omnichannel = registry
        .group("Omnichannel", GroupOptions::new().label("Omnichannel").sorter(1))
        .await?;
    omnichannel
        .add(LIVECHAT_ENABLED, true, SettingOptions::new().public())
        .await?;
    omnichannel
        .section("Routing")
        .add(
            LIVECHAT_ROUTING_METHOD,
            "Auto_Selection",
            SettingOptions::new().values(["Auto_Selection", "Manual_Selection", "External"]),
        )
        .await?;
    omnichannel
        .section("Routing")
        .add(
            "Livechat_maximum_chats_per_agent",
            0,
            SettingOptions::new()
                .min(0.0)
                .description("0 means unlimited"),
        )
        .await?;
    omnichannel
        .add("Livechat_allow_manual_on_hold", false, SettingOptions::new())
        .await?;
    omnichannel
        .add(
            "Livechat_business_hour_type",
            "Single",
            SettingOptions::new().values(["Single", "Multiple"]),
        )
        .await?;

    let rate_limiter = registry
        .group("Rate Limiter", GroupOptions::new().label("Rate Limiter").sorter(2))
        .await?;
    rate_limiter
        .add("API_Enable_Rate_Limiter", true, SettingOptions::new())
        .await?;
    rate_limiter
        .add(
            "API_Enable_Rate_Limiter_Limit_Calls_Default",
            10,
            SettingOptions::new().min(1.0),
        )
        .await?;
    rate_limiter
        .add(
            "API_Enable_Rate_Limiter_Limit_Time_Default",
            60_000,
            SettingOptions::new().min(1.0).description("Window in milliseconds"),
        )
        .await?;

    Ok(())
}
