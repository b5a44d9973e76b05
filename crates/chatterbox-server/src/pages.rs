//! Minimal inline HTML pages. The chat page talks to the JSON and text
//! routes with `fetch`; everything else is a plain form.

use chatterbox_shared::constants::APP_NAME;

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · {APP_NAME}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 42rem; margin: 2rem auto; padding: 0 1rem; }}
form.stack {{ display: grid; gap: .5rem; max-width: 20rem; }}
.error {{ color: #b00020; }}
#log {{ border: 1px solid #ccc; border-radius: 6px; padding: .5rem; height: 24rem; overflow-y: auto; }}
.me {{ text-align: right; }}
.bot {{ color: #225; }}
</style>
</head>
<body>
{body}
</body>
</html>"#,
        title = escape(title),
    )
}

fn error_line(error: Option<&str>) -> String {
    error
        .map(|e| format!(r#"<p class="error">{}</p>"#, escape(e)))
        .unwrap_or_default()
}

pub fn login_page(error: Option<&str>) -> String {
    let body = format!(
        r#"<h1>Log in</h1>
{error}
<form class="stack" method="post" action="/login">
<input name="username" placeholder="Username" autocomplete="username" required>
<input name="password" type="password" placeholder="Password" autocomplete="current-password" required>
<label><input type="checkbox" name="remember"> Remember me</label>
<button>Log in</button>
</form>
<p>No account yet? <a href="/register">Register</a></p>"#,
        error = error_line(error),
    );
    layout("Log in", &body)
}

pub fn register_page(error: Option<&str>, open: bool) -> String {
    if !open {
        return layout(
            "Register",
            r#"<h1>Register</h1><p>Registration is closed on this server.</p><p><a href="/login">Log in</a></p>"#,
        );
    }
    let body = format!(
        r#"<h1>Create an account</h1>
{error}
<form class="stack" method="post" action="/register">
<input name="username" placeholder="Username" autocomplete="username" required>
<input name="password" type="password" placeholder="Password (6+ characters)" autocomplete="new-password" required>
<input name="display_name" placeholder="Display name (optional)">
<input name="email" type="email" placeholder="Email (optional)">
<button>Register</button>
</form>
<p>Already registered? <a href="/login">Log in</a></p>"#,
        error = error_line(error),
    );
    layout("Register", &body)
}

pub fn chat_page(username: &str) -> String {
    let body = format!(
        r#"<h1>{APP_NAME}</h1>
<p>Signed in as <strong>{user}</strong> · <button id="new">New chat</button> <button id="logout">Log out</button></p>
<div id="log"></div>
<form id="chat">
<input id="message" name="message" autocomplete="off" placeholder="Say something..." style="width: 80%">
<button>Send</button>
</form>
<script>
let chatId = null;
const log = document.getElementById('log');
function show(text, mine) {{
  const p = document.createElement('p');
  p.className = mine ? 'me' : 'bot';
  p.textContent = text;
  log.appendChild(p);
  log.scrollTop = log.scrollHeight;
}}
async function loadHistory() {{
  const res = await fetch('/get_history' + (chatId ? '?chatId=' + encodeURIComponent(chatId) : ''));
  if (!res.ok) return;
  const data = await res.json();
  chatId = data.chatId;
  log.innerHTML = '';
  data.messages.forEach(m => show(m.text, m.isUser));
}}
document.getElementById('chat').addEventListener('submit', async e => {{
  e.preventDefault();
  const input = document.getElementById('message');
  const form = new URLSearchParams({{ message: input.value }});
  if (chatId) form.set('chatId', chatId);
  show(input.value, true);
  input.value = '';
  const res = await fetch('/get_response', {{ method: 'POST', body: form }});
  chatId = res.headers.get('x-chat-id') || chatId;
  show(await res.text(), false);
}});
document.getElementById('new').addEventListener('click', async () => {{
  const res = await fetch('/new_chat', {{ method: 'POST' }});
  chatId = (await res.json()).chatId;
  log.innerHTML = '';
}});
document.getElementById('logout').addEventListener('click', async () => {{
  await fetch('/logout', {{ method: 'POST' }});
  location.href = '/login';
}});
loadHistory();
</script>"#,
        user = escape(username),
    );
    layout("Chat", &body)
}
