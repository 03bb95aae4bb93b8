use gpui::{
    AnyElement, InteractiveElement, IntoElement, ParentElement, Styled, Window, WindowControlArea,
    div, px,
};
use gpui_component::{StyledExt, h_flex};

use super::{AppView, WINDOW_TITLE};
use crate::config::Rgb;

const TITLEBAR_HEIGHT: f32 = 36.0;

impl AppView {
    pub(super) fn render_titlebar(
        &self,
        background: Rgb,
        window: &mut Window,
    ) -> AnyElement {
        let scene = self.show.scene().scene();

        h_flex()
            .window_control_area(WindowControlArea::Drag)
            .h(px(TITLEBAR_HEIGHT))
            .w_full()
            .flex_shrink_0()
            .items_center()
            .justify_between()
            .bg(gpui::rgb(background.to_hex()))
            .child(
                h_flex()
                    .gap_3()
                    .pl(px(80.0))
                    .items_center()
                    .child(
                        div()
                            .font_semibold()
                            .text_color(gpui::rgb(0xffffff))
                            .child(WINDOW_TITLE),
                    )
                    .child(
                        div()
                            .px_2()
                            .py_0p5()
                            .rounded_md()
                            .bg(gpui::rgba(0x00000033))
                            .text_xs()
                            .text_color(gpui::rgb(0xe5e7eb))
                            .child(scene.name()),
                    ),
            )
            .child(window_controls(window))
            .into_any_element()
    }
}

#[cfg(target_os = "macos")]
fn window_controls(_window: &mut Window) -> AnyElement {
    // Traffic lights are drawn by the system.
    div().into_any_element()
}

#[cfg(not(target_os = "macos"))]
fn window_controls(window: &mut Window) -> AnyElement {
    let maximize_glyph = if window.is_maximized() { "❐" } else { "□" };
    h_flex()
        .h_full()
        .child(control_button("minimize", WindowControlArea::Min, 0x404040, "–"))
        .child(control_button(
            "maximize",
            WindowControlArea::Max,
            0x404040,
            maximize_glyph,
        ))
        .child(control_button("close", WindowControlArea::Close, 0xe81123, "×"))
        .into_any_element()
}

#[cfg(not(target_os = "macos"))]
fn control_button(
    id: &'static str,
    area: WindowControlArea,
    hover: u32,
    glyph: &'static str,
) -> impl IntoElement {
    div()
        .id(id)
        .flex()
        .items_center()
        .justify_center()
        .occlude()
        .w(px(46.0))
        .h_full()
        .text_color(gpui::rgb(0xffffff))
        .hover(|s| s.bg(gpui::rgb(hover)))
        .window_control_area(area)
        .child(glyph)
}
