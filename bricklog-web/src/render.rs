//! Pure record-to-HTML fragment builders. Nothing here touches the network
//! or any state; handlers fetch, these functions only format.

use bricklog_client::FriendAction;
use bricklog_common::{FriendRequest, Friendship, LegoSet, Profile, SetStatus};

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Transient notification. The markup carries its own show/remove timing:
/// the page script adds the `show` class after a beat, then removes the
/// element 300ms after the duration elapses.
pub fn toast(message: &str, kind: &str, duration_ms: u32) -> String {
    format!(
        "<div class=\"simple-notification notification-{}\" data-duration=\"{duration_ms}\">\
         <p>{}</p></div>",
        escape(kind),
        escape(message)
    )
}

/// Blocking confirm overlay. The continuation is the form action, posted
/// only on Confirm; Cancel and the backdrop both lead back.
pub fn confirm_dialog(message: &str, action: &str, cancel_href: &str) -> String {
    let action = escape(action);
    let cancel_href = escape(cancel_href);
    format!(
        "<div class=\"lego-confirm-overlay show\">\
           <a class=\"confirm-backdrop\" href=\"{cancel_href}\"></a>\
           <div class=\"lego-confirm-dialog\">\
             <p>{}</p>\
             <div class=\"lego-confirm-buttons\">\
               <form method=\"post\" action=\"{action}\">\
                 <button type=\"submit\" class=\"confirm-yes btn-danger\">Confirm</button>\
               </form>\
               <a class=\"confirm-no btn-secondary\" href=\"{cancel_href}\">Cancel</a>\
             </div>\
           </div>\
         </div>",
        escape(message)
    )
}

const STYLE: &str = "\
body{font-family:sans-serif;background:#1a1a2e;color:#eee;margin:0}\
nav{display:flex;gap:16px;align-items:center;padding:12px 24px;background:#16213e}\
nav a{color:#eee;text-decoration:none}\
main{max-width:960px;margin:0 auto;padding:24px}\
.sets-grid{display:grid;grid-template-columns:repeat(auto-fill,minmax(260px,1fr));gap:16px}\
.set-card{background:rgba(255,255,255,.05);border-radius:10px;overflow:hidden}\
.set-image{width:100%;height:140px;object-fit:cover;background:#0f3460}\
.set-content{padding:14px}\
.set-details{color:#bbb;font-size:.9em;margin:4px 0}\
.status-badge{display:inline-block;padding:2px 10px;border-radius:10px;background:#dc0a2d;font-size:.8em}\
.empty-state{text-align:center;color:#999;padding:40px}\
.btn-blue{background:#0f52ba;color:#fff;border:0;padding:8px 14px;border-radius:6px;cursor:pointer}\
.btn-danger{background:#dc0a2d;color:#fff;border:0;padding:8px 14px;border-radius:6px;cursor:pointer}\
.btn-secondary{background:#444;color:#fff;border:0;padding:8px 14px;border-radius:6px;cursor:pointer}\
.simple-notification{position:fixed;top:20px;right:20px;padding:14px 20px;border-radius:8px;\
background:#16213e;opacity:0;transition:opacity .3s}\
.simple-notification.show{opacity:1}\
.notification-error{border-left:4px solid #dc0a2d}\
.notification-success{border-left:4px solid #2e8b57}\
.notification-info{border-left:4px solid #0f52ba}\
.lego-confirm-overlay{position:fixed;inset:0;background:rgba(0,0,0,.6);display:flex;\
align-items:center;justify-content:center;opacity:0;transition:opacity .3s}\
.lego-confirm-overlay.show{opacity:1}\
.confirm-backdrop{position:absolute;inset:0}\
.lego-confirm-dialog{position:relative;background:#16213e;padding:24px;border-radius:10px}\
.lego-confirm-buttons{display:flex;gap:10px;justify-content:flex-end;margin-top:16px}\
form.stack label{display:block;margin:8px 0 2px}\
form.stack input,form.stack textarea,form.stack select{width:100%;padding:6px;border-radius:6px;\
border:1px solid #444;background:#0f1626;color:#eee}";

const TOAST_SCRIPT: &str = "\
document.querySelectorAll('.simple-notification').forEach(function(el){\
setTimeout(function(){el.classList.add('show')},10);\
var ms=Number(el.dataset.duration||4000);\
setTimeout(function(){el.classList.remove('show');\
setTimeout(function(){el.remove()},300)},ms)});";

/// Page chrome. `user_display` is `@username` when a profile exists, the
/// raw email otherwise, absent on the login page.
pub fn page(title: &str, user_display: Option<&str>, body: &str, toast_html: &str) -> String {
    let nav = match user_display {
        Some(name) => format!(
            "<nav><strong>bricklog</strong>\
             <a href=\"/collection\">My Collection</a>\
             <a href=\"/profile\">Profile</a>\
             <a href=\"/friends\">Friends</a>\
             <a href=\"/find-friends\">Find Friends</a>\
             <span id=\"userDisplay\">{}</span>\
             <a href=\"/logout\">Logout</a></nav>",
            escape(name)
        ),
        None => "<nav><strong>bricklog</strong></nav>".to_string(),
    };
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <title>{} - bricklog</title><style>{STYLE}</style></head>\
         <body>{nav}<main>{body}</main>{toast_html}\
         <script>{TOAST_SCRIPT}</script></body></html>",
        escape(title)
    )
}

/// Login and signup are two modes of the same form.
pub fn login_page(signup: bool) -> String {
    let (title, submit, toggle) = if signup {
        (
            "Sign Up",
            "Sign Up",
            "Already have an account? <a href=\"/?mode=login\">Login</a>",
        )
    } else {
        (
            "Login",
            "Login",
            "Don't have an account? <a href=\"/?mode=signup\">Sign up</a>",
        )
    };
    format!(
        "<h1 id=\"authTitle\">{title}</h1>\
         <form class=\"stack\" method=\"post\" action=\"/auth\">\
           <input type=\"hidden\" name=\"mode\" value=\"{}\">\
           <label for=\"authEmail\">Email</label>\
           <input id=\"authEmail\" name=\"email\" type=\"email\" required>\
           <label for=\"authPassword\">Password</label>\
           <input id=\"authPassword\" name=\"password\" type=\"password\" required>\
           <button type=\"submit\" class=\"btn-blue\">{submit}</button>\
         </form>\
         <p id=\"authToggleText\">{toggle}</p>",
        if signup { "signup" } else { "login" }
    )
}

fn optional_row(label: &str, value: &Option<String>) -> String {
    match value {
        Some(v) if !v.is_empty() => format!(
            "<p class=\"set-details\"><strong>{label}</strong> {}</p>",
            escape(v)
        ),
        _ => String::new(),
    }
}

/// One card per set. The editable variant embeds the serialized record in
/// the edit form so editing round-trips without a second fetch.
pub fn set_card(set: &LegoSet, editable: bool) -> String {
    let image = match &set.image_url {
        Some(url) if !url.is_empty() => format!(
            "<img src=\"{}\" class=\"set-image\" alt=\"{}\">",
            escape(url),
            escape(&set.name)
        ),
        _ => "<div class=\"set-image\"></div>".to_string(),
    };
    let year = set
        .year
        .map(|y| format!("<p class=\"set-details\"><strong>YEAR</strong> {y}</p>"))
        .unwrap_or_default();
    let pieces = set
        .piece_count
        .map(|p| format!("<p class=\"set-details\"><strong>PIECES</strong> {p}</p>"))
        .unwrap_or_default();
    let actions = if editable {
        let record = serde_json::to_string(set).unwrap_or_default();
        format!(
            "<div class=\"card-actions\">\
             <form method=\"post\" action=\"/sets/edit\">\
               <input type=\"hidden\" name=\"record\" value=\"{}\">\
               <button type=\"submit\" class=\"btn-secondary\">Edit</button>\
             </form>\
             <a class=\"btn-danger\" href=\"/collection?confirm_delete={}\">Delete</a>\
             </div>",
            escape(&record),
            set.id.0
        )
    } else {
        String::new()
    };
    format!(
        "<div class=\"set-card\">{image}<div class=\"set-content\"><div class=\"set-info\">\
         <h3>{}</h3>\
         <p class=\"set-details\"><strong>SET</strong> {}</p>\
         <p class=\"set-details\"><strong>THEME</strong> {}</p>\
         {year}{pieces}{}\
         <span class=\"status-badge status-{}\">{}</span>\
         </div>{actions}</div></div>",
        escape(&set.name),
        escape(&set.set_number),
        escape(&set.theme),
        optional_row("NOTES", &set.notes),
        set.status,
        set.status,
    )
}

pub fn sets_grid(sets: &[LegoSet], editable: bool, empty_hint: &str) -> String {
    if sets.is_empty() {
        return format!(
            "<div class=\"empty-state\"><h3>No sets found</h3><p>{}</p></div>",
            escape(empty_hint)
        );
    }
    let cards: String = sets.iter().map(|s| set_card(s, editable)).collect();
    format!("<div class=\"sets-grid\" id=\"setsGrid\">{cards}</div>")
}

fn selected(current: Option<SetStatus>, this: SetStatus) -> &'static str {
    if current == Some(this) {
        " selected"
    } else {
        ""
    }
}

/// The status filter and search box. Status goes back to the backend;
/// the search text only narrows the fetched page. `hidden` carries extra
/// hidden inputs for pages whose identity lives in the query string.
pub fn filter_bar(action: &str, status: Option<SetStatus>, query: &str, hidden: &str) -> String {
    format!(
        "<form method=\"get\" action=\"{action}\">{hidden}\
         <select name=\"status\" id=\"filterStatus\">\
           <option value=\"\">All statuses</option>\
           <option value=\"owned\"{}>Owned</option>\
           <option value=\"building\"{}>Building</option>\
           <option value=\"wanted\"{}>Wanted</option>\
         </select>\
         <input id=\"searchSets\" name=\"q\" placeholder=\"Search sets...\" value=\"{}\">\
         <button type=\"submit\" class=\"btn-blue\">Apply</button>\
         </form>",
        selected(status, SetStatus::Owned),
        selected(status, SetStatus::Building),
        selected(status, SetStatus::Wanted),
        escape(query),
    )
}

fn text_value(value: &Option<String>) -> String {
    value.as_deref().map(escape).unwrap_or_default()
}

/// The add/edit form. A non-empty hidden `editing_id` switches the submit
/// into update mode; clearing it returns the form to create mode.
pub fn set_form(editing: Option<&LegoSet>) -> String {
    let blank = String::new();
    let (editing_id, number, name, theme, year, pieces, image, notes) = match editing {
        Some(set) => (
            set.id.0.clone(),
            escape(&set.set_number),
            escape(&set.name),
            escape(&set.theme),
            set.year.map(|y| y.to_string()).unwrap_or_default(),
            set.piece_count.map(|p| p.to_string()).unwrap_or_default(),
            text_value(&set.image_url),
            text_value(&set.notes),
        ),
        None => (
            String::new(),
            blank.clone(),
            blank.clone(),
            blank.clone(),
            blank.clone(),
            blank.clone(),
            blank.clone(),
            blank,
        ),
    };
    let status = editing.map(|s| s.status);
    let submit = if editing.is_some() {
        "UPDATE SET"
    } else {
        "ADD TO COLLECTION"
    };
    format!(
        "<form class=\"stack add-set-form\" id=\"addSetForm\" method=\"post\" action=\"/sets\">\
         <input type=\"hidden\" name=\"editing_id\" value=\"{editing_id}\">\
         <label for=\"setNumber\">Set number</label>\
         <input id=\"setNumber\" name=\"set_number\" value=\"{number}\" required>\
         <label for=\"setName\">Name</label>\
         <input id=\"setName\" name=\"name\" value=\"{name}\" required>\
         <label for=\"setTheme\">Theme</label>\
         <input id=\"setTheme\" name=\"theme\" value=\"{theme}\" required>\
         <label for=\"setYear\">Year</label>\
         <input id=\"setYear\" name=\"year\" value=\"{year}\">\
         <label for=\"setPieceCount\">Piece count</label>\
         <input id=\"setPieceCount\" name=\"piece_count\" value=\"{pieces}\">\
         <label for=\"setImageUrl\">Image URL</label>\
         <input id=\"setImageUrl\" name=\"image_url\" value=\"{image}\">\
         <label for=\"setStatus\">Status</label>\
         <select id=\"setStatus\" name=\"status\">\
           <option value=\"owned\"{}>Owned</option>\
           <option value=\"building\"{}>Building</option>\
           <option value=\"wanted\"{}>Wanted</option>\
         </select>\
         <label for=\"setNotes\">Notes</label>\
         <textarea id=\"setNotes\" name=\"notes\">{notes}</textarea>\
         <button type=\"submit\" class=\"btn-blue\">{submit}</button>\
         </form>",
        selected(status, SetStatus::Owned),
        selected(status, SetStatus::Building),
        selected(status, SetStatus::Wanted),
    )
}

fn username_of(profile: Option<&Profile>) -> String {
    profile
        .map(|p| format!("@{}", escape(&p.username)))
        .unwrap_or_else(|| "@Unknown".to_string())
}

pub fn request_card(request: &FriendRequest, profile: Option<&Profile>) -> String {
    format!(
        "<div class=\"friend-request-card\">\
         <div><strong>{}</strong>\
         <p class=\"set-details\">Sent {}</p></div>\
         <div class=\"card-actions\">\
           <form method=\"post\" action=\"/requests/{}/accept\">\
             <button type=\"submit\" class=\"btn-blue\">Accept</button>\
           </form>\
           <form method=\"post\" action=\"/requests/{}/decline\">\
             <button type=\"submit\" class=\"btn-danger\">Decline</button>\
           </form>\
         </div></div>",
        username_of(profile),
        request.created_at.format("%Y-%m-%d"),
        request.id.0,
        request.id.0,
    )
}

pub fn requests_list(requests: &[(FriendRequest, Option<Profile>)]) -> String {
    if requests.is_empty() {
        return "<p class=\"empty-state\">No pending friend requests</p>".to_string();
    }
    requests
        .iter()
        .map(|(request, profile)| request_card(request, profile.as_ref()))
        .collect()
}

pub fn friend_card(edge: &Friendship, profile: Option<&Profile>) -> String {
    let avatar = match profile.and_then(|p| p.avatar_url.as_deref()) {
        Some(url) if !url.is_empty() => format!(
            "<img src=\"{}\" class=\"set-image\" alt=\"{}\">",
            escape(url),
            username_of(profile)
        ),
        _ => "<div class=\"set-image\"></div>".to_string(),
    };
    let bio = profile
        .and_then(|p| p.bio.as_deref())
        .map(|b| format!("<p class=\"set-details\">{}</p>", escape(b)))
        .unwrap_or_default();
    let name = profile.map(|p| p.username.as_str()).unwrap_or("friend");
    format!(
        "<div class=\"set-card\">{avatar}<div class=\"set-content\"><div class=\"set-info\">\
         <h3>{}</h3>{bio}\
         <p class=\"set-details\"><strong>FRIENDS SINCE</strong> {}</p>\
         </div><div class=\"card-actions\">\
         <a class=\"btn-blue\" href=\"/friend-collection?id={}&name={}\">View Collection</a>\
         <a class=\"btn-danger\" href=\"/friends?confirm_remove={}&name={}\">Remove</a>\
         </div></div></div>",
        username_of(profile),
        edge.created_at.format("%Y-%m-%d"),
        edge.friend_id.0,
        urlencoding::encode(name),
        edge.id.0,
        urlencoding::encode(name),
    )
}

pub fn friends_list(edges: &[(Friendship, Option<Profile>)]) -> String {
    if edges.is_empty() {
        return "<div class=\"empty-state\"><h3>No friends yet</h3>\
                <p>Head over to <a href=\"/find-friends\">Find Friends</a> to start \
                connecting!</p></div>"
            .to_string();
    }
    let cards: String = edges
        .iter()
        .map(|(edge, profile)| friend_card(edge, profile.as_ref()))
        .collect();
    format!("<div class=\"sets-grid\" id=\"friendsList\">{cards}</div>")
}

pub fn hidden_input(name: &str, value: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"{name}\" value=\"{}\">",
        escape(value)
    )
}

pub fn user_search_bar(query: &str) -> String {
    format!(
        "<form method=\"get\" action=\"/find-friends\">\
         <input id=\"searchUsers\" name=\"q\" value=\"{}\" placeholder=\"Search by username...\">\
         <button type=\"submit\" class=\"btn-blue\">Search</button>\
         </form>",
        escape(query)
    )
}

pub fn search_placeholder() -> String {
    "<p class=\"empty-state\">Enter a username to search</p>".to_string()
}

pub fn search_result_card(profile: &Profile, action: FriendAction, query: &str) -> String {
    let button = match action {
        FriendAction::AlreadyFriends => {
            "<button class=\"btn-secondary\" disabled>Already Friends</button>".to_string()
        }
        FriendAction::RequestSent => {
            "<button class=\"btn-secondary\" disabled>Request Sent</button>".to_string()
        }
        FriendAction::AddFriend => format!(
            "<form method=\"post\" action=\"/requests\">\
             <input type=\"hidden\" name=\"receiver_id\" value=\"{}\">\
             <input type=\"hidden\" name=\"username\" value=\"{}\">\
             <input type=\"hidden\" name=\"q\" value=\"{}\">\
             <button type=\"submit\" class=\"btn-blue\">Add Friend</button>\
             </form>",
            profile.id.0,
            escape(&profile.username),
            escape(query),
        ),
    };
    let bio = profile
        .bio
        .as_deref()
        .map(|b| format!("<p class=\"set-details\">{}</p>", escape(b)))
        .unwrap_or_default();
    format!(
        "<div class=\"set-card\"><div class=\"set-content\"><div class=\"set-info\">\
         <h3>@{}</h3>{bio}</div><div class=\"card-actions\">{button}</div></div></div>",
        escape(&profile.username)
    )
}

pub fn search_results(results: &[(Profile, FriendAction)], query: &str) -> String {
    if results.is_empty() {
        return "<p class=\"empty-state\">No users found</p>".to_string();
    }
    let cards: String = results
        .iter()
        .map(|(profile, action)| search_result_card(profile, *action, query))
        .collect();
    format!("<div class=\"sets-grid\" id=\"searchResults\">{cards}</div>")
}

/// The profile form; blank when no profile exists yet. The email field is
/// display-only.
pub fn profile_form(profile: Option<&Profile>, email: &str) -> String {
    let username = profile.map(|p| escape(&p.username)).unwrap_or_default();
    let bio = profile.map(|p| text_value(&p.bio)).unwrap_or_default();
    let avatar = profile
        .map(|p| text_value(&p.avatar_url))
        .unwrap_or_default();
    format!(
        "<form class=\"stack\" id=\"profileForm\" method=\"post\" action=\"/profile\">\
         <label for=\"userEmail\">Email</label>\
         <input id=\"userEmail\" value=\"{}\" disabled>\
         <label for=\"username\">Username</label>\
         <input id=\"username\" name=\"username\" value=\"{username}\" required>\
         <label for=\"bio\">Bio</label>\
         <textarea id=\"bio\" name=\"bio\">{bio}</textarea>\
         <label for=\"avatarUrl\">Avatar URL</label>\
         <input id=\"avatarUrl\" name=\"avatar_url\" value=\"{avatar}\">\
         <button type=\"submit\" class=\"btn-blue\">Save Profile</button>\
         </form>",
        escape(email)
    )
}
