use serde::Deserialize;
use url::Url;

/// A listed user, as returned inside the paginated envelope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub badge_counts: BadgeCounts,
    pub user_id: i64,
    pub display_name: String,
    #[serde(default)]
    pub profile_image: Option<Url>,
    pub link: Url,
    #[serde(default)]
    pub location: Option<String>,
    pub reputation: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BadgeCounts {
    pub bronze: u32,
    pub silver: u32,
    pub gold: u32,
}

impl BadgeCounts {
    pub fn total(&self) -> u32 {
        self.bronze + self.silver + self.gold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_decodes_from_wire_shape() {
        let user: User = serde_json::from_str(
            r#"{
                "badge_counts": {"bronze": 9, "silver": 5, "gold": 1},
                "account_id": 11683,
                "user_id": 22656,
                "display_name": "Jon Skeet",
                "profile_image": "https://www.gravatar.com/avatar/6d8ebb117e8d83d74ea95fbdd0f87e13?s=256",
                "link": "https://stackoverflow.com/users/22656/jon-skeet",
                "reputation": 1519349
            }"#,
        )
        .unwrap();

        assert_eq!(user.user_id, 22656);
        assert_eq!(user.location, None);
        assert_eq!(user.badge_counts.total(), 15);
        assert!(user.profile_image.is_some());
    }
}
