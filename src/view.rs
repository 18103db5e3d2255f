//! HTML pages.
//!
//! Pages are small enough that they are written out by hand. Anything that
//! came from a user goes through [`Escape`].

use std::fmt::{self, Display, Formatter, Write as _};

use hearthstone_tracker_model::{RankDirection, User};

use crate::rank::{Requester, can_adjust};

/// Escapes text for use in HTML text and attribute values.
#[derive(Clone, Copy, Debug)]
pub struct Escape<'a>(pub &'a str);

impl Display for Escape<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut mark = 0;

        for (ix, ch) in self.0.char_indices() {
            let escaped = match ch {
                '&' => "&amp;",
                '<' => "&lt;",
                '>' => "&gt;",
                '"' => "&quot;",
                '\'' => "&#39;",
                _ => continue,
            };

            f.write_str(&self.0[mark..ix])?;
            f.write_str(escaped)?;
            mark = ix + ch.len_utf8();
        }

        f.write_str(&self.0[mark..])
    }
}

/// Everything shared by every page.
#[derive(Clone, Debug)]
pub struct Layout<'a> {
    /// The page title.
    pub title: &'a str,
    /// The name of the signed in user, if any.
    pub signed_in_as: Option<&'a str>,
    /// The session's CSRF token, echoed by every form.
    pub csrf: &'a str,
    /// A one-shot message to show at the top of the page.
    pub notice: Option<&'a str>,
}

impl Layout<'_> {
    fn render(&self, body: &str) -> String {
        let mut html = String::with_capacity(body.len() + 1024);

        // writing to a `String` cannot fail
        let _ = write!(
            html,
            "<!DOCTYPE html>\n\
            <html lang=\"en\">\n\
            <head>\n\
            <meta charset=\"utf-8\">\n\
            <title>{title}</title>\n\
            </head>\n\
            <body>\n\
            <nav class=\"navbar\">\n\
            <a class=\"navbar-brand\" href=\"/\">{title}</a>\n",
            title = Escape(self.title),
        );

        match self.signed_in_as {
            Some(name) => {
                let _ = write!(
                    html,
                    "<span class=\"navbar-text\">Signed in as {name}</span>\n\
                    <form method=\"post\" action=\"/logout\">\
                    {csrf}<button type=\"submit\" id=\"logout\">Sign out</button></form>\n",
                    name = Escape(name),
                    csrf = CsrfField(self.csrf),
                );
            }
            None => html.push_str("<a href=\"/login\" id=\"login\">Sign in</a>\n"),
        }

        html.push_str("</nav>\n");

        if let Some(notice) = self.notice {
            let _ = writeln!(
                html,
                "<div class=\"alert alert-info\" role=\"alert\">{}</div>",
                Escape(notice),
            );
        }

        html.push_str(body);
        html.push_str("</body>\n</html>\n");
        html
    }
}

/// The hidden CSRF field of a form.
struct CsrfField<'a>(&'a str);

impl Display for CsrfField<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<input type=\"hidden\" name=\"csrf\" value=\"{}\">",
            Escape(self.0)
        )
    }
}

/// Renders the home page, listing `users` in order.
///
/// Rank controls are only rendered for the user `requester` may adjust.
pub fn home(layout: &Layout<'_>, users: &[User], requester: Option<&Requester>) -> String {
    let mut body = String::from("<div class=\"users\">\n");

    for user in users {
        let rank = user.display_rank();
        let progress = user.progress();

        let _ = write!(
            body,
            "<div class=\"user\" id=\"{id}\">\n\
            <h4>{name}</h4>\n\
            <div class=\"rank {class}\" title=\"Rank {rank}\"></div>\n\
            <div class=\"progress\">\
            <div class=\"progress-bar\" role=\"progressbar\" \
            aria_valuenow=\"{progress}\" aria-valuenow=\"{progress}\" \
            aria-valuemin=\"0\" aria-valuemax=\"100\" style=\"width: {progress}%;\">\
            </div></div>\n",
            id = user.id,
            name = Escape(&user.name),
            class = rank.css_class(),
        );

        if can_adjust(requester, user.id) {
            for direction in [RankDirection::Up, RankDirection::Down] {
                let _ = writeln!(
                    body,
                    "<form method=\"post\" action=\"/users/{id}/go-{direction}\">\
                    {csrf}<button type=\"submit\" id=\"{id}-go-{direction}\" \
                    name=\"{id}-go-{direction}\">Go {direction}</button></form>",
                    id = user.id,
                    csrf = CsrfField(layout.csrf),
                );
            }
        }

        body.push_str("</div>\n");
    }

    body.push_str("</div>\n");

    layout.render(&body)
}

/// Renders the sign in page.
pub fn login(layout: &Layout<'_>) -> String {
    let body = format!(
        "<form method=\"post\" action=\"/login\" class=\"login\">\n\
        {csrf}\n\
        <label for=\"email\">Email</label>\n\
        <input type=\"email\" id=\"email\" name=\"email\" required>\n\
        <label for=\"password\">Password</label>\n\
        <input type=\"password\" id=\"password\" name=\"password\" required>\n\
        <button type=\"submit\" id=\"sign-in\">Sign in</button>\n\
        </form>\n",
        csrf = CsrfField(layout.csrf),
    );

    layout.render(&body)
}
