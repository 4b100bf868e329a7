//! Canned user-facing texts shared between the command layer and the
//! wizards.

/// Reply to /start
pub const WELCOME: &str = "👋 Welcome!\n\n\
This is your private bot for posting to the website.\n\
Use /newpost to create a post, /viewposts to see recent ones.\n\
Type /cancel anytime to stop.\n\n\
Your menu shows available commands based on your role.";

/// First prompt of the post wizard
pub const TITLE_PROMPT: &str = "What should be the post title? (plain text)";
/// Re-prompt when the title was empty or not text
pub const TITLE_REQUIRED: &str = "Please send a title (text required).";

/// Content prompt with the supported Markdown subset
pub const CONTENT_PROMPT: &str = "Now send the post content (main body text).\n\n\
You can use basic Markdown:\n\
• *italic* or _italic_\n\
• **bold** or __bold__\n\
• [link text](https://example.com)\n\
• - unordered list\n\
• 1. ordered list\n\
• `inline code`\n\
• ```code block```\n\n\
Send your content (multiple lines OK).";
/// Re-prompt when content was missing
pub const CONTENT_REQUIRED: &str = "Please send the post content as text.";

/// Category selection prompt (buttons attached)
pub const CATEGORY_PROMPT: &str =
    "Select a category for this post (required):\nTap one of the buttons below.";
/// Re-prompt when something other than a category button arrives
pub const CATEGORY_REQUIRED: &str =
    "Please select a category using the buttons above.\nCategory is required – tap one to continue.";
/// Notice when the list cannot be fetched
pub const CATEGORY_FETCH_FAILED: &str = "Error loading categories. Using default (Uncategorized).";
/// Notice when the site has no categories
pub const CATEGORY_NONE: &str = "No categories found – auto-assigned to Uncategorized.";
/// Appended to the category message once a button was pressed
pub const CATEGORY_SELECTED_SUFFIX: &str = "\n\nCategory selected. Moving to photo...";

/// Photo prompt
pub const PHOTO_PROMPT: &str = "Send a photo to use as the featured image (optional).\n\
Or send /skip if you don't want one.";
/// Re-prompt at the photo step
pub const PHOTO_OR_SKIP: &str = "Please send a photo or type /skip.";
/// Caption prompt
pub const CAPTION_PROMPT: &str = "Optional caption for the featured image (or /skip):";

/// Sent right before the publish sequence runs
pub const POSTING: &str = "Posting to WordPress...";
/// Publish failure (detail goes to the log)
pub const POST_ERROR: &str = "Error posting. Check logs.";
/// Terminal step received something other than /confirm
pub const POST_CANCELLED: &str = "Cancelled or invalid. Use /newpost to start again.";

/// Edit wizard could not load the post
pub const EDIT_LOAD_ERROR: &str = "Error loading post. Try again.";
/// Edit wizard entered without a post id
pub const EDIT_NO_POST_ID: &str = "No post ID provided. Try /viewposts again.";
/// Status prompt of the edit wizard
pub const STATUS_PROMPT: &str = "Choose new status:\n\n\
1. publish\n\
2. draft\n\
3. pending\n\
4. private\n\
5. trash (deletes)\n\n\
Reply with number or word (or /skip to keep current):";
/// Edit confirmation was declined
pub const EDIT_CANCELLED: &str = "Update cancelled.";
/// Edit failed upstream
pub const EDIT_ERROR: &str = "Error updating post. Check logs.";

/// /cancel with an active conversation
pub const CANCELLED: &str = "Action cancelled.";
/// /cancel without one
pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";

/// A step handler blew up; the cursor stays put
pub const STEP_ERROR: &str = "Error processing your input. Please try again.";

/// Unknown slash command outside a conversation
pub const UNKNOWN_COMMAND: &str = "Unknown command. Use the menu button (/) for available commands.";
/// Unauthorized user, first contact within the cooldown window
pub const ACCESS_DENIED: &str =
    "⛔️ Access denied. Ask an admin for an invite code and use /addmetobot <code>.";
