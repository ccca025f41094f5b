use super::DragPollSample;

pub trait PointerProbe: Send {
    fn name(&self) -> &str;

    fn sample(&mut self) -> Option<DragPollSample>;
}

pub fn platform_probe() -> Option<Box<dyn PointerProbe>> {
    #[cfg(target_os = "windows")]
    {
        Some(Box::new(win32::Win32PointerProbe::new()))
    }

    #[cfg(not(target_os = "windows"))]
    {
        None
    }
}

#[cfg(target_os = "windows")]
mod win32 {
    use eframe::egui::Pos2;
    use windows::Win32::{
        Foundation::POINT,
        UI::{
            Input::KeyboardAndMouse::{GetAsyncKeyState, VK_LBUTTON, VK_RBUTTON},
            WindowsAndMessaging::{
                GetCursorPos, GetSystemMetrics, SM_CXDRAG, SM_CYDRAG, SM_SWAPBUTTON,
            },
        },
    };

    use super::{DragPollSample, PointerProbe};

    /// Windows has no global drag pasteboard to inspect. A primary button
    /// held down and moved past the system drag threshold is treated as a
    /// drag carrying files.
    pub struct Win32PointerProbe {
        press_origin: Option<Pos2>,
    }

    impl Win32PointerProbe {
        pub fn new() -> Self {
            Self { press_origin: None }
        }
    }

    fn key_down(vkey: u16) -> bool {
        let state = unsafe { GetAsyncKeyState(vkey as i32) };
        (state as u16 & 0x8000) != 0
    }

    impl PointerProbe for Win32PointerProbe {
        fn name(&self) -> &str {
            "win32-async-key-state"
        }

        fn sample(&mut self) -> Option<DragPollSample> {
            let mut point = POINT::default();
            unsafe { GetCursorPos(&mut point) }.ok()?;
            let location = Pos2::new(point.x as f32, point.y as f32);

            let swapped = unsafe { GetSystemMetrics(SM_SWAPBUTTON) } != 0;
            let primary = if swapped { VK_RBUTTON } else { VK_LBUTTON };
            let down = key_down(primary.0);

            let dragged = if down {
                let origin = *self.press_origin.get_or_insert(location);
                let threshold_x = unsafe { GetSystemMetrics(SM_CXDRAG) }.max(1) as f32;
                let threshold_y = unsafe { GetSystemMetrics(SM_CYDRAG) }.max(1) as f32;
                (location.x - origin.x).abs() > threshold_x
                    || (location.y - origin.y).abs() > threshold_y
            } else {
                self.press_origin = None;
                false
            };

            Some(DragPollSample {
                mouse_button_down: down,
                pasteboard_has_file_urls: dragged,
                mouse_location: location,
            })
        }
    }
}
