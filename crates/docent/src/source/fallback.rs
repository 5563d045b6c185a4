//! Bundled substitute for the remote document

/// Served verbatim when neither source URL can be fetched
pub const FALLBACK_TEXT: &str = "\
Canadian Forces Temporary Duty Travel Instructions (CFTDTI)

The Canadian Forces Temporary Duty Travel Instructions (CFTDTI) are the National Defence's policy governing travel on temporary duty. These instructions apply to members of the Canadian Armed Forces (CAF) and to other persons travelling on behalf of the Department of National Defence and the CAF.

These instructions provide direction on:
- Travel authorization and arrangements
- Transportation entitlements
- Accommodation entitlements
- Meal entitlements
- Incidental expense allowances
- Other travel-related benefits and requirements

For specific entitlements and rates, please consult the official documentation or your orderly room.";
