use crate::error::{Result, WwError};
use crate::window::NO_ACTIVE_WINDOW;

use super::{Payload, ScriptRequest};

/// Общая часть скрипта. Алгоритм выбора совпадает с `window::Matcher`.
const SCRIPT_BODY: &str = r#"
function wwIsOnCurrentDesktop(window) {
    if (window.onAllDesktops) {
        return true;
    }
    if (workspace.currentDesktop !== undefined && window.desktops !== undefined) {
        return window.desktops.includes(workspace.currentDesktop);
    }
    return true;
}

function wwCandidates(filter) {
    var windows = workspace.windowList();
    var test;
    if (filter.classExact.length > 0) {
        test = function (w) { return w.resourceClass == filter.classExact; };
    } else if (filter.classPattern.length > 0) {
        var classRe = new RegExp(filter.classPattern);
        test = function (w) { return classRe.test(w.resourceClass); };
    } else {
        var captionRe = new RegExp(filter.captionPattern, 'i');
        test = function (w) { return captionRe.test(w.caption); };
    }

    var result = [];
    for (var i = 0; i < windows.length; i++) {
        var w = windows[i];
        if (!test(w)) {
            continue;
        }
        if (filter.currentDesktopOnly && !wwIsOnCurrentDesktop(w)) {
            continue;
        }
        result.push(w);
    }
    return result;
}

function wwActivate(filter, toggle) {
    var candidates = wwCandidates(filter);
    if (candidates.length === 0) {
        return;
    }

    var active = workspace.activeWindow;
    if (candidates.length === 1) {
        var only = candidates[0];
        if (only !== active) {
            workspace.activeWindow = only;
        } else if (toggle) {
            only.minimized = !only.minimized;
        }
        return;
    }

    var activeIsCandidate = candidates.indexOf(active) !== -1;
    candidates.sort(function (a, b) {
        return a.stackingOrder - b.stackingOrder;
    });
    // Уже в этом приложении - по кругу к первому окну, иначе к последнему поднятому
    workspace.activeWindow = activeIsCandidate ? candidates[0] : candidates[candidates.length - 1];
}

function wwWindowInfo() {
    var w = workspace.activeWindow;
    if (!w) {
        return '__NO_ACTIVE_WINDOW__';
    }
    var desktops = (w.desktops || []).map(function (d) { return d.name; });
    return [
        'class: ' + w.resourceClass,
        'caption: ' + w.caption,
        'id: ' + w.internalId,
        'desktops: ' + desktops.join(', '),
        'onAllDesktops: ' + w.onAllDesktops,
        'minimized: ' + w.minimized,
        'fullscreen: ' + w.fullScreen
    ].join('\n');
}

function wwMain(filter, toggle, mode, replyAddress) {
    if (mode === 'windowInfo') {
        callDBus(replyAddress, '/', '', 'windowInfo', wwWindowInfo());
    } else if (mode === 'countOnly') {
        callDBus(replyAddress, '/', '', 'matchCount', String(wwCandidates(filter).length));
    } else if (mode === 'detectOnly') {
        callDBus(replyAddress, '/', '', 'hasMatches', (wwCandidates(filter).length > 0).toString());
    } else {
        wwActivate(filter, toggle);
    }
}
"#;

/// Оборачивает значение в одинарные кавычки, удваивая обратную косую черту.
/// Кавычки и переводы строк не экранируются, такие значения отклоняются.
fn js_literal(field: &str, value: &str) -> Result<String> {
    if let Some(bad) = value
        .chars()
        .find(|c| matches!(c, '\'' | '\n' | '\r' | '\u{2028}' | '\u{2029}'))
    {
        return WwError::user_input(format!(
            "значение {} содержит недопустимый символ {:?}: {}",
            field, bad, value
        ));
    }
    Ok(format!("'{}'", value.replace('\\', "\\\\")))
}

fn js_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Генерирует скрипт KWin для запроса. Одинаковый запрос даёт побайтно одинаковый текст.
pub fn render(request: &ScriptRequest) -> Result<Payload> {
    let filter = &request.filter;
    let invocation = format!(
        "wwMain({{classExact: {}, captionPattern: {}, classPattern: {}, currentDesktopOnly: {}}}, {}, {}, {});\n",
        js_literal("класса", &filter.class_exact)?,
        js_literal("заголовка", &filter.caption_pattern)?,
        js_literal("регулярного выражения", &filter.class_pattern)?,
        js_bool(filter.current_desktop_only),
        js_bool(request.toggle),
        js_literal("режима", request.mode.as_str())?,
        js_literal("адреса ответа", &request.reply_address)?,
    );

    let mut text = SCRIPT_BODY.replace("__NO_ACTIVE_WINDOW__", NO_ACTIVE_WINDOW);
    text.push_str(&invocation);

    Ok(Payload {
        request: request.clone(),
        text,
    })
}
